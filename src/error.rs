//! Error types for the biodata engine.
//!
//! Each concern owns one enum. The FFI layer folds all of them into
//! [`AppResponse`](crate::app_response::AppResponse) so the host can tell the
//! kinds apart.

use thiserror::Error;

/// Durable storage failures. Never fatal to the in-memory document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Stored data could not be serialized: {0}")]
    Serialization(String),
}

impl From<lmdb::Error> for StorageError {
    fn from(err: lmdb::Error) -> Self {
        match err {
            lmdb::Error::MapFull => StorageError::QuotaExceeded(
                "LMDB map is full; export your data and clear some space".to_string(),
            ),
            other => StorageError::Backend(format!("LMDB error: {other}")),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// A reducer action that cannot be applied to the current document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("Section not found: {0}")]
    SectionNotFound(String),

    #[error("Field not found: {field_id} in section {section_id}")]
    FieldNotFound { section_id: String, field_id: String },

    #[error("Reorder list is not a permutation of the current ids: {0}")]
    NotAPermutation(String),

    #[error("Duplicate id: {0}")]
    DuplicateId(String),
}

/// Why an import was refused. The store is untouched in every case.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    #[error("Import file is not valid JSON: {0}")]
    Parse(String),

    #[error("Invalid biodata export format: {0}")]
    Structure(String),

    #[error("Incompatible version: {found}. Current version: {expected}")]
    Version { found: String, expected: String },
}

/// Rasterize or page-building failure; retryable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExportError {
    #[error("An export is already in progress")]
    AlreadyInFlight,

    #[error("Rasterization failed: {0}")]
    Rasterize(String),

    #[error("Page document could not be built: {0}")]
    Build(String),

    #[error("Export file could not be written: {0}")]
    Io(String),

    #[error("Export worker panicked: {0}")]
    Panicked(String),
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err.to_string())
    }
}

impl From<lopdf::Error> for ExportError {
    fn from(err: lopdf::Error) -> Self {
        ExportError::Build(format!("PDF error: {err}"))
    }
}

impl From<image::ImageError> for ExportError {
    fn from(err: image::ImageError) -> Self {
        ExportError::Build(format!("Image encoding error: {err}"))
    }
}

/// A photo that could not be decoded or re-encoded for storage.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhotoError {
    #[error("Bounding box must be non-zero, got {max_width}x{max_height}")]
    InvalidBounds { max_width: u32, max_height: u32 },

    #[error("Photo could not be processed: {0}")]
    Image(String),
}

impl From<image::ImageError> for PhotoError {
    fn from(err: image::ImageError) -> Self {
        PhotoError::Image(err.to_string())
    }
}
