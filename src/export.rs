//! Print export: page description → raster → single-page PDF.
//!
//! Drawing the page is the host's job, behind [`Rasterizer`]. This module
//! fits the raster onto an A4 page, encodes it as JPEG and wraps it in a PDF
//! with [`PdfPageBuilder`]. [`ExportJob`] runs that work on a worker thread
//! over a snapshot and tracks its status; the editable document is never
//! touched, whatever the outcome.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, RgbaImage};
use log::{info, warn};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use serde::Serialize;

use crate::error::ExportError;
use crate::render::{PageSize, RenderedPage};

/// Turns a page description into pixels.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, page: &RenderedPage, scale: f32) -> Result<RgbaImage, ExportError>;
}

/// Wraps a raster into a printable document.
pub trait PageDocumentBuilder: Send + Sync {
    fn build(&self, raster: &RgbaImage, page: PageSize) -> Result<Vec<u8>, ExportError>;
}

/// A raster the host already produced in memory.
pub struct FixedRaster(pub RgbaImage);

impl Rasterizer for FixedRaster {
    fn rasterize(&self, _page: &RenderedPage, _scale: f32) -> Result<RgbaImage, ExportError> {
        Ok(self.0.clone())
    }
}

/// A raster the host wrote to an image file (PNG or JPEG).
pub struct ImageFileRaster {
    path: PathBuf,
}

impl ImageFileRaster {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Rasterizer for ImageFileRaster {
    fn rasterize(&self, _page: &RenderedPage, _scale: f32) -> Result<RgbaImage, ExportError> {
        let image = image::open(&self.path)
            .map_err(|e| ExportError::Rasterize(format!("{}: {e}", self.path.display())))?;
        Ok(image.to_rgba8())
    }
}

/// Where the raster lands on the page, in page units with the origin at the
/// bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Scales a `raster_w` × `raster_h` image onto a `page_w` × `page_h` page,
/// preserving its aspect ratio.
///
/// The image is fitted to the page width first. If that makes it taller than
/// the page it is fitted to the height instead and centered horizontally;
/// otherwise it is centered vertically.
pub fn fit_to_page(raster_w: f32, raster_h: f32, page_w: f32, page_h: f32) -> Placement {
    if raster_w <= 0.0 || raster_h <= 0.0 {
        return Placement { x: 0.0, y: 0.0, width: page_w, height: page_h };
    }

    let ratio = raster_h / raster_w;
    let height = page_w * ratio;
    if height > page_h {
        let width = page_h / ratio;
        Placement {
            x: (page_w - width) / 2.0,
            y: 0.0,
            width,
            height: page_h,
        }
    } else {
        Placement {
            x: 0.0,
            y: (page_h - height) / 2.0,
            width: page_w,
            height,
        }
    }
}

/// Single-page PDF with the raster embedded as a JPEG image.
#[derive(Debug, Clone)]
pub struct PdfPageBuilder {
    /// JPEG quality, 1-100.
    pub quality: u8,
}

impl Default for PdfPageBuilder {
    fn default() -> Self {
        Self { quality: 92 }
    }
}

impl PdfPageBuilder {
    pub fn new(quality: u8) -> Self {
        Self { quality: quality.clamp(1, 100) }
    }

    fn encode_jpeg(&self, raster: &RgbaImage) -> Result<(Vec<u8>, u32, u32), ExportError> {
        let rgb = DynamicImage::ImageRgba8(raster.clone()).to_rgb8();
        let (width, height) = rgb.dimensions();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode(
            rgb.as_raw(),
            width,
            height,
            ColorType::Rgb8,
        )?;
        Ok((jpeg, width, height))
    }
}

impl PageDocumentBuilder for PdfPageBuilder {
    fn build(&self, raster: &RgbaImage, page: PageSize) -> Result<Vec<u8>, ExportError> {
        if raster.width() == 0 || raster.height() == 0 {
            return Err(ExportError::Rasterize("raster is empty".to_string()));
        }

        let (jpeg, width, height) = self.encode_jpeg(raster)?;
        let (page_w, page_h) = page.points();
        let placement = fit_to_page(width as f32, height as f32, page_w, page_h);

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
                "Filter" => "DCTDecode",
            },
            jpeg,
        ));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(placement.width),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(placement.height),
                        Object::Real(placement.x),
                        Object::Real(placement.y),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let resources_id = doc.add_object(dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        });
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Real(page_w), Object::Real(page_h)],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1_i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

/// Snapshot handed to an export; independent of later edits.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub page: RenderedPage,
    pub scale: f32,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ExportStatus {
    Idle,
    InFlight,
    #[serde(rename_all = "camelCase")]
    Succeeded {
        file_name: String,
        size_bytes: usize,
        path: Option<PathBuf>,
    },
    Failed { message: String },
}

/// Finished export kept until the host takes it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
struct JobState {
    status: ExportStatus,
    output: Option<ExportedFile>,
}

/// At most one export at a time.
#[derive(Clone)]
pub struct ExportJob {
    state: Arc<Mutex<JobState>>,
}

impl Default for ExportJob {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportJob {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(JobState {
                status: ExportStatus::Idle,
                output: None,
            })),
        }
    }

    pub fn status(&self) -> ExportStatus {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).status.clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.status() == ExportStatus::InFlight
    }

    /// Takes the last successful output, if any.
    pub fn take_output(&self) -> Option<ExportedFile> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).output.take()
    }

    /// Starts an export on a worker thread. When `destination` is a
    /// directory, the PDF is also written there under the request's file
    /// name.
    pub fn start(
        &self,
        request: ExportRequest,
        rasterizer: Arc<dyn Rasterizer>,
        builder: Arc<dyn PageDocumentBuilder>,
        destination: Option<PathBuf>,
    ) -> Result<JoinHandle<()>, ExportError> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.status == ExportStatus::InFlight {
                return Err(ExportError::AlreadyInFlight);
            }
            state.status = ExportStatus::InFlight;
            state.output = None;
        }

        info!("Starting export of {}", request.file_name);
        let state = Arc::clone(&self.state);
        let handle = thread::spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                run_export(&request, rasterizer.as_ref(), builder.as_ref(), destination.as_deref())
            }))
            .unwrap_or_else(|payload| Err(ExportError::Panicked(panic_message(payload.as_ref()))));
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            match outcome {
                Ok((bytes, path)) => {
                    info!("Export {} finished ({} bytes)", request.file_name, bytes.len());
                    state.status = ExportStatus::Succeeded {
                        file_name: request.file_name.clone(),
                        size_bytes: bytes.len(),
                        path,
                    };
                    state.output = Some(ExportedFile {
                        file_name: request.file_name,
                        bytes,
                    });
                }
                Err(e) => {
                    warn!("Export {} failed: {e}", request.file_name);
                    state.status = ExportStatus::Failed { message: e.to_string() };
                }
            }
        });
        Ok(handle)
    }
}

fn run_export(
    request: &ExportRequest,
    rasterizer: &dyn Rasterizer,
    builder: &dyn PageDocumentBuilder,
    destination: Option<&Path>,
) -> Result<(Vec<u8>, Option<PathBuf>), ExportError> {
    let raster = rasterizer.rasterize(&request.page, request.scale)?;
    let bytes = builder.build(&raster, request.page.page)?;

    let path = match destination {
        Some(dir) => {
            let path = dir.join(&request.file_name);
            std::fs::write(&path, &bytes)?;
            Some(path)
        }
        None => None,
    };
    Ok((bytes, path))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
