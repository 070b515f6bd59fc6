//! Photo downscaling before a photo is stored in the document.
//!
//! Photos live inside the draft as data URLs, so every byte counts against
//! the storage map. Uploads are shrunk to fit a bounding box and re-encoded
//! as JPEG.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ColorType;
use log::debug;

use crate::error::PhotoError;

pub const DEFAULT_MAX_WIDTH: u32 = 800;
pub const DEFAULT_MAX_HEIGHT: u32 = 800;
pub const DEFAULT_QUALITY: u8 = 80;

/// Dimensions after fitting `width` × `height` inside the bounding box.
///
/// The width limit is applied first, then the height limit to the result.
/// Images that already fit keep their size; nothing is ever enlarged.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let (mut w, mut h) = (width as f64, height as f64);
    if w > max_width as f64 {
        h = h * max_width as f64 / w;
        w = max_width as f64;
    }
    if h > max_height as f64 {
        w = w * max_height as f64 / h;
        h = max_height as f64;
    }
    ((w.round() as u32).max(1), (h.round() as u32).max(1))
}

/// Decodes `bytes` (JPEG, PNG, GIF or WebP), fits the image inside
/// `max_width` × `max_height` and returns it as a `data:image/jpeg;base64,`
/// URL encoded at `quality` (1-100).
pub fn compress_photo(bytes: &[u8], max_width: u32, max_height: u32, quality: u8) -> Result<String, PhotoError> {
    if max_width == 0 || max_height == 0 {
        return Err(PhotoError::InvalidBounds { max_width, max_height });
    }

    let image = image::load_from_memory(bytes)?;
    let (width, height) = fit_within(image.width(), image.height(), max_width, max_height);
    let image = if (width, height) == (image.width(), image.height()) {
        image
    } else {
        image.resize_exact(width, height, FilterType::Triangle)
    };

    let rgb = image.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100)).encode(
        rgb.as_raw(),
        width,
        height,
        ColorType::Rgb8,
    )?;
    debug!("Compressed photo from {} to {} bytes ({width}x{height})", bytes.len(), jpeg.len());

    Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(&jpeg)))
}
