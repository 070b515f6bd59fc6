//! Import/export envelope and file naming.
//!
//! An export wraps a copy of the document in `{ version, exportedAt, data }`.
//! An import is checked in three stages, each with its own [`ImportError`]
//! kind: raw JSON shape, major schema version, then typed decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::biodata_model::{display_name, Biodata, DISPLAY_NAME_PLACEHOLDER};
use crate::error::ImportError;
use crate::reducer::check_identity_invariants;

/// Schema version written into documents and envelopes.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Versioned wrapper used for JSON export and import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub data: Biodata,
}

/// Wraps a deep copy of `doc` in an envelope stamped with `now`.
pub fn export_envelope(doc: &Biodata, now: DateTime<Utc>) -> ExportEnvelope {
    ExportEnvelope {
        version: SCHEMA_VERSION.to_string(),
        exported_at: now,
        data: doc.clone(),
    }
}

/// Pretty-printed envelope JSON, the content of the downloadable file.
pub fn export_json(doc: &Biodata, now: DateTime<Utc>) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&export_envelope(doc, now))
}

/// Parses raw file text and validates it as an envelope.
pub fn parse_envelope_text(text: &str) -> Result<ExportEnvelope, ImportError> {
    let value: JsonValue = serde_json::from_str(text).map_err(|e| ImportError::Parse(e.to_string()))?;
    parse_envelope(value)
}

/// Validates already-parsed JSON as an envelope.
///
/// Nothing is applied anywhere; the caller dispatches the import only when
/// this returns `Ok`.
pub fn parse_envelope(value: JsonValue) -> Result<ExportEnvelope, ImportError> {
    check_envelope_shape(&value)?;

    let version = value
        .get("version")
        .and_then(JsonValue::as_str)
        .unwrap_or_default()
        .to_string();
    if !is_compatible_version(&version) {
        return Err(ImportError::Version {
            found: version,
            expected: SCHEMA_VERSION.to_string(),
        });
    }

    let envelope: ExportEnvelope =
        serde_json::from_value(value).map_err(|e| ImportError::Structure(e.to_string()))?;
    check_identity_invariants(&envelope.data).map_err(|e| ImportError::Structure(e.to_string()))?;
    Ok(envelope)
}

/// Same major component as [`SCHEMA_VERSION`].
pub fn is_compatible_version(version: &str) -> bool {
    major_component(version) == major_component(SCHEMA_VERSION)
}

fn major_component(version: &str) -> &str {
    version.split('.').next().unwrap_or_default()
}

fn check_envelope_shape(value: &JsonValue) -> Result<(), ImportError> {
    let top = value
        .as_object()
        .ok_or_else(|| ImportError::Structure("top level must be an object".to_string()))?;
    require_string(top, "version", "")?;
    require_string(top, "exportedAt", "")?;

    let data = top
        .get("data")
        .and_then(JsonValue::as_object)
        .ok_or_else(|| ImportError::Structure("`data` must be an object".to_string()))?;
    for key in ["id", "createdAt", "updatedAt"] {
        require_string(data, key, "data.")?;
    }
    if !data.get("sections").is_some_and(JsonValue::is_array) {
        return Err(ImportError::Structure("`data.sections` must be an array".to_string()));
    }
    require_string(data, "templateId", "data.")
}

fn require_string(object: &Map<String, JsonValue>, key: &str, prefix: &str) -> Result<(), ImportError> {
    if object.get(key).is_some_and(JsonValue::is_string) {
        Ok(())
    } else {
        Err(ImportError::Structure(format!("`{prefix}{key}` must be a string")))
    }
}

/// Keeps ASCII letters, digits and whitespace, then joins whitespace runs
/// with `_`.
pub fn sanitize_file_stem(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join("_")
}

/// `biodata_{name}_{YYYY-MM-DD}.{extension}`.
///
/// The name comes from `meta.name`, then the personal name field, then the
/// literal `biodata`.
pub fn export_file_name(doc: &Biodata, extension: &str, now: DateTime<Utc>) -> String {
    let from_meta = sanitize_file_stem(&doc.meta.name);
    let stem = if !from_meta.is_empty() {
        from_meta
    } else {
        let name = display_name(doc);
        let from_field = if name == DISPLAY_NAME_PLACEHOLDER {
            String::new()
        } else {
            sanitize_file_stem(&name)
        };
        if from_field.is_empty() {
            "biodata".to_string()
        } else {
            from_field
        }
    };
    format!("biodata_{stem}_{}.{extension}", now.format("%Y-%m-%d"))
}
