use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

use crate::error::{ActionError, ExportError, ImportError, PhotoError, StorageError};

/// Envelope returned by every FFI function as a JSON C string.
///
/// `Ok` carries the JSON payload of the call, itself encoded as a string.
#[derive(Debug, Serialize, Deserialize)]
pub enum AppResponse {
    StorageError(String),
    QuotaExceeded(String),
    SerializationError(String),
    NotFound(String),
    ValidationError(String),
    ActionRejected(String),
    ImportStructureError(String),
    ImportVersionError(String),
    ExportError(String),
    ExportInFlight(String),
    BadRequest(String),
    Ok(String),
}

impl Display for AppResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppResponse::StorageError(msg) => write!(f, "Storage error: {}", msg),
            AppResponse::QuotaExceeded(msg) => write!(f, "Quota exceeded: {}", msg),
            AppResponse::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppResponse::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppResponse::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppResponse::ActionRejected(msg) => write!(f, "Action rejected: {}", msg),
            AppResponse::ImportStructureError(msg) => write!(f, "Import structure error: {}", msg),
            AppResponse::ImportVersionError(msg) => write!(f, "Import version error: {}", msg),
            AppResponse::ExportError(msg) => write!(f, "Export error: {}", msg),
            AppResponse::ExportInFlight(msg) => write!(f, "Export in flight: {}", msg),
            AppResponse::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppResponse::Ok(msg) => write!(f, "Ok: {}", msg),
        }
    }
}

impl From<SerdeError> for AppResponse {
    fn from(err: SerdeError) -> Self {
        AppResponse::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl From<StorageError> for AppResponse {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::QuotaExceeded(_) => AppResponse::QuotaExceeded(err.to_string()),
            StorageError::Serialization(_) => AppResponse::SerializationError(err.to_string()),
            StorageError::Backend(_) => AppResponse::StorageError(err.to_string()),
        }
    }
}

impl From<ActionError> for AppResponse {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::SectionNotFound(_) | ActionError::FieldNotFound { .. } => {
                AppResponse::NotFound(err.to_string())
            }
            _ => AppResponse::ActionRejected(err.to_string()),
        }
    }
}

impl From<ImportError> for AppResponse {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Version { .. } => AppResponse::ImportVersionError(err.to_string()),
            _ => AppResponse::ImportStructureError(err.to_string()),
        }
    }
}

impl From<ExportError> for AppResponse {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::AlreadyInFlight => AppResponse::ExportInFlight(err.to_string()),
            _ => AppResponse::ExportError(err.to_string()),
        }
    }
}

impl From<PhotoError> for AppResponse {
    fn from(err: PhotoError) -> Self {
        AppResponse::ValidationError(err.to_string())
    }
}

impl AppResponse {
    pub fn success(msg: impl Into<String>) -> Self {
        AppResponse::Ok(msg.into())
    }

    /// `Ok` with `value` serialized as its payload.
    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(json) => AppResponse::Ok(json),
            Err(e) => AppResponse::from(e),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, AppResponse::Ok(_))
    }
}
