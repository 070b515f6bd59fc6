//! Store configuration.
//!
//! Every key is optional; `create_store` accepts a JSON object such as
//! `{"autosaveDelayMs": 500}` and fills the rest from [`StoreConfig::default`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::storage::DOCUMENT_KEY;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Storage key for the draft document.
    pub storage_key: String,
    pub autosave_delay_ms: u64,
    pub preview_delay_ms: u64,
    /// Scale of debounced preview renders.
    pub preview_scale: f32,
    /// Pixel density multiplier for PDF rasterization.
    pub export_scale: f32,
    /// JPEG quality (1-100) of the raster embedded in the PDF.
    pub jpeg_quality: u8,
    /// LMDB map size; writes beyond it report a quota error.
    pub map_size_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_key: DOCUMENT_KEY.to_string(),
            autosave_delay_ms: 1000,
            preview_delay_ms: 300,
            preview_scale: 1.0,
            export_scale: 2.0,
            jpeg_quality: 92,
            map_size_bytes: 10 * 1024 * 1024,
        }
    }
}

impl StoreConfig {
    /// Parses a JSON config; blank input yields the defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json)
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    pub fn preview_delay(&self) -> Duration {
        Duration::from_millis(self.preview_delay_ms)
    }
}
