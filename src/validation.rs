//! Field and document validation.
//!
//! Validation is advisory: results are plain data, nothing here returns an
//! error or touches the store. Empty values are always valid; whether a
//! document is filled in is measured separately by [`completion_percentage`].

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::biodata_model::{parse_calendar_date, Biodata, BiodataField, FieldType};

/// Largest accepted photo upload.
pub const MAX_PHOTO_BYTES: u64 = 5 * 1024 * 1024;

/// Largest accepted import file.
pub const MAX_IMPORT_BYTES: u64 = 1024 * 1024;

const PHOTO_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValidation {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FieldValidation {
    pub fn ok() -> Self {
        Self { valid: true, message: None }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self { valid: false, message: Some(message.into()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub field_id: String,
    pub section_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentValidation {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
}

impl DocumentValidation {
    pub fn errors_for_section<'a>(&'a self, section_id: &'a str) -> impl Iterator<Item = &'a ValidationIssue> + 'a {
        self.errors.iter().filter(move |e| e.section_id == section_id)
    }

    pub fn error_for_field(&self, section_id: &str, field_id: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.section_id == section_id && e.field_id == field_id)
            .map(|e| e.message.as_str())
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

fn phone_regex() -> &'static Regex {
    static PHONE_RE: OnceLock<Regex> = OnceLock::new();
    PHONE_RE.get_or_init(|| Regex::new(r"^(\+91|91|0)?[6-9]\d{9}$").expect("valid phone regex"))
}

pub fn is_valid_email(value: &str) -> bool {
    email_regex().is_match(value)
}

/// Indian mobile number, optionally prefixed by `+91`, `91` or `0`.
/// Spaces and hyphens are ignored.
pub fn is_valid_phone(value: &str) -> bool {
    let cleaned: String = value.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    phone_regex().is_match(&cleaned)
}

pub fn is_valid_url(value: &str) -> bool {
    url::Url::parse(value).is_ok()
}

pub fn is_valid_date(value: &str) -> bool {
    parse_calendar_date(value).is_some()
}

/// Checks one field's value against its type and constraint set.
pub fn validate_field(field: &BiodataField) -> FieldValidation {
    let value = field.value.as_str();
    if value.trim().is_empty() {
        return FieldValidation::ok();
    }

    let type_failure = match field.field_type {
        FieldType::Email if !is_valid_email(value) => Some("Please enter a valid email address"),
        FieldType::Phone if !is_valid_phone(value) => Some("Please enter a valid phone number"),
        FieldType::Url if !is_valid_url(value) => Some("Please enter a valid URL"),
        FieldType::Date if !is_valid_date(value) => Some("Please enter a valid date"),
        _ => None,
    };
    if let Some(message) = type_failure {
        return FieldValidation::fail(message);
    }

    let Some(constraints) = &field.validation else {
        return FieldValidation::ok();
    };
    let custom = constraints.message.as_deref();
    let length = value.chars().count();

    if let Some(min) = constraints.min_length.filter(|m| *m > 0) {
        if length < min {
            return FieldValidation::fail(
                custom.map(str::to_string).unwrap_or_else(|| format!("Minimum {min} characters required")),
            );
        }
    }

    if let Some(max) = constraints.max_length.filter(|m| *m > 0) {
        if length > max {
            return FieldValidation::fail(
                custom.map(str::to_string).unwrap_or_else(|| format!("Maximum {max} characters allowed")),
            );
        }
    }

    if let Some(pattern) = constraints.pattern.as_deref().filter(|p| !p.is_empty()) {
        // An uncompilable pattern can never be satisfied.
        let matched = Regex::new(pattern).map(|re| re.is_match(value)).unwrap_or(false);
        if !matched {
            return FieldValidation::fail(custom.unwrap_or("Invalid format"));
        }
    }

    FieldValidation::ok()
}

/// Validates every visible field of every visible section.
///
/// Hidden sections and fields are skipped entirely.
pub fn validate_document(doc: &Biodata) -> DocumentValidation {
    let mut errors = Vec::new();

    for section in doc.sections.iter().filter(|s| s.visible) {
        for field in section.fields.iter().filter(|f| f.visible) {
            let result = validate_field(field);
            if let (false, Some(message)) = (result.valid, result.message) {
                errors.push(ValidationIssue {
                    field_id: field.id.clone(),
                    section_id: section.id.clone(),
                    message,
                });
            }
        }
    }

    DocumentValidation { valid: errors.is_empty(), errors }
}

/// Percentage of visible fields (in visible sections) with a non-blank value.
/// A document with no such fields counts as complete.
pub fn completion_percentage(doc: &Biodata) -> u8 {
    let (total, filled) = doc
        .sections
        .iter()
        .filter(|s| s.visible)
        .flat_map(|s| s.fields.iter().filter(|f| f.visible))
        .fold((0usize, 0usize), |(total, filled), field| {
            let done = usize::from(!field.value.trim().is_empty());
            (total + 1, filled + done)
        });

    if total == 0 {
        return 100;
    }
    ((filled as f64 / total as f64) * 100.0).round() as u8
}

/// Checks a photo before it is turned into a data URL.
pub fn validate_photo_upload(mime_type: &str, size_bytes: u64) -> FieldValidation {
    if !PHOTO_MIME_TYPES.contains(&mime_type) {
        return FieldValidation::fail("Please upload a valid image file (JPEG, PNG, GIF, or WebP)");
    }
    if size_bytes > MAX_PHOTO_BYTES {
        return FieldValidation::fail("Image size must be less than 5MB");
    }
    FieldValidation::ok()
}

/// Checks a file chosen for import before it is read.
pub fn validate_import_file(file_name: &str, mime_type: &str, size_bytes: u64) -> FieldValidation {
    if mime_type != "application/json" && !file_name.ends_with(".json") {
        return FieldValidation::fail("Please upload a valid JSON file");
    }
    if size_bytes > MAX_IMPORT_BYTES {
        return FieldValidation::fail("JSON file size must be less than 1MB");
    }
    FieldValidation::ok()
}
