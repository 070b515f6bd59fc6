//! # Biodata Core
//!
//! Offline-first document engine for marriage biodata forms, designed for FFI
//! integration with Flutter and other cross-platform hosts. A document is an
//! ordered list of sections holding ordered, typed fields, plus presentation
//! settings (template, background, photo, style overrides).
//!
//! ## Features
//!
//! - **Pure reducer**: every edit is a named [`reducer::Action`] applied by a
//!   deterministic transition function
//! - **Autosave**: debounced writes to an LMDB environment; a full map is
//!   reported as a quota error and never loses the in-memory document
//! - **Import/export**: versioned JSON envelope with structural and version
//!   checks before anything is applied
//! - **Print export**: a single A4 PDF page built from a host-supplied raster
//! - **Safe error handling**: no `unwrap()` calls in production code
//!
//! ## Quick Start
//!
//! ```no_run
//! use biodata_core::{create_store, dispatch_action, free_response};
//! use std::ffi::CString;
//! use std::ptr;
//!
//! let name = CString::new("biodata").unwrap();
//! let store = create_store(name.as_ptr(), ptr::null());
//!
//! let action = CString::new(
//!     r#"{"type":"UPDATE_FIELD","sectionId":"personal","fieldId":"name","value":"Asha Sharma"}"#,
//! ).unwrap();
//! let response = dispatch_action(store, action.as_ptr());
//! free_response(response as *mut _);
//! ```
//!
//! ## FFI Functions
//!
//! Every function except [`create_store`] and [`free_response`] returns a
//! JSON-serialized [`app_response::AppResponse`] as a C string that must be
//! released with [`free_response`].
//!
//! - [`create_store`] - Open the store and restore the saved draft
//! - [`dispatch_action`] - Apply an edit
//! - [`get_document`] - Current document
//! - [`validate_document`] / [`completion_percentage`] - Derived checks
//! - [`render_page`] - Page description for a preview
//! - [`export_document`] / [`import_document`] - JSON envelope round trip
//! - [`move_item`] - Drag-and-drop reorder arithmetic
//! - [`compress_photo`] - Shrink a photo into a JPEG data URL
//! - [`tick_store`] / [`flush_store`] / [`save_status`] / [`reload_store`] - Autosave
//! - [`start_pdf_export`] / [`export_status`] - Print export
//! - [`close_store`] - Flush and release the store

pub mod app_response;
pub mod biodata_model;
pub mod biodata_store;
pub mod codec;
pub mod config;
pub mod debounce;
pub mod defaults;
pub mod error;
pub mod export;
pub mod photo;
pub mod reducer;
pub mod render;
pub mod reorder;
pub mod storage;
pub mod templates;
pub mod validation;
mod test;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use serde_json::json;

use crate::app_response::AppResponse;
use crate::biodata_store::BiodataStore;
use crate::config::StoreConfig;
use crate::export::{ExportJob, ImageFileRaster, PdfPageBuilder};
use crate::reducer::Action;
use crate::storage::LmdbStorage;
use crate::validation::MAX_PHOTO_BYTES;

/// A store plus its export job, owned by the host through a raw pointer.
pub struct StoreHandle {
    store: BiodataStore<LmdbStorage>,
    export: ExportJob,
}

impl StoreHandle {
    pub fn store(&self) -> &BiodataStore<LmdbStorage> {
        &self.store
    }
}

/// Opens a store backed by the LMDB environment `{name}.lmdb`.
///
/// The saved draft is restored when it is usable; otherwise the store starts
/// from the default document.
///
/// # Parameters
///
/// * `name` - Null-terminated C string with the storage name
/// * `config_json` - Optional null-terminated JSON object with
///   [`StoreConfig`] keys (camelCase); null means defaults
///
/// # Returns
///
/// A pointer to the [`StoreHandle`], or null on failure. Release it with
/// [`close_store`].
///
/// # Safety
///
/// Both pointers, when non-null, must point to valid C strings.
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use biodata_core::create_store;
///
/// let name = CString::new("biodata").unwrap();
/// let config = CString::new(r#"{"autosaveDelayMs": 500}"#).unwrap();
/// let store = create_store(name.as_ptr(), config.as_ptr());
/// assert!(!store.is_null());
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_store(name: *const c_char, config_json: *const c_char) -> *mut StoreHandle {
    if name.is_null() {
        warn!("Null name pointer passed to create_store");
        return std::ptr::null_mut();
    }

    let name_str = match unsafe { CStr::from_ptr(name).to_str() } {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid UTF-8 in name parameter: {e}");
            return std::ptr::null_mut();
        }
    };

    let config = if config_json.is_null() {
        StoreConfig::default()
    } else {
        let raw = match unsafe { CStr::from_ptr(config_json).to_str() } {
            Ok(s) => s,
            Err(e) => {
                warn!("Invalid UTF-8 in config parameter: {e}");
                return std::ptr::null_mut();
            }
        };
        match StoreConfig::from_json(raw) {
            Ok(config) => config,
            Err(e) => {
                warn!("Invalid store config: {e}");
                return std::ptr::null_mut();
            }
        }
    };

    info!("Opening biodata store '{name_str}'");
    match LmdbStorage::open(name_str, config.map_size_bytes) {
        Ok(storage) => {
            let handle = StoreHandle {
                store: BiodataStore::open(storage, config),
                export: ExportJob::new(),
            };
            info!("✅ Store ready");
            Box::into_raw(Box::new(handle))
        }
        Err(e) => {
            warn!("❌ Failed to open storage for '{name_str}': {e}");
            std::ptr::null_mut()
        }
    }
}

/// Applies one [`Action`] to the document.
///
/// # Parameters
///
/// * `handle` - Store handle from [`create_store`]
/// * `action_json` - Action object tagged by `type`, e.g.
///   `{"type":"REMOVE_SECTION","sectionId":"family"}`
///
/// # Returns
///
/// `Ok` with the updated document, `NotFound` for an unknown section or
/// field, `ActionRejected` for other rejected actions.
///
/// # Safety
///
/// `handle` must come from [`create_store`] and not be closed.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn dispatch_action(handle: *mut StoreHandle, action_json: *const c_char) -> *const c_char {
    let handle = match handle_mut(handle, "dispatch_action") {
        Ok(h) => h,
        Err(err) => return err,
    };

    let json_str = match c_ptr_to_string(action_json, "action") {
        Ok(json) => json,
        Err(err) => return err,
    };

    let action: Action = match serde_json::from_str(&json_str) {
        Ok(action) => action,
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Invalid action: {e}"));
            return response_to_c_string(&error);
        }
    };

    match handle.store.dispatch(action) {
        Ok(()) => response_to_c_string(&AppResponse::json(handle.store.document())),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_document(handle: *mut StoreHandle) -> *const c_char {
    match handle_mut(handle, "get_document") {
        Ok(h) => response_to_c_string(&AppResponse::json(h.store.document())),
        Err(err) => err,
    }
}

/// Validates every visible field; returns `{ valid, errors: [...] }`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn validate_document(handle: *mut StoreHandle) -> *const c_char {
    match handle_mut(handle, "validate_document") {
        Ok(h) => response_to_c_string(&AppResponse::json(&h.store.validate())),
        Err(err) => err,
    }
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn completion_percentage(handle: *mut StoreHandle) -> *const c_char {
    match handle_mut(handle, "completion_percentage") {
        Ok(h) => response_to_c_string(&AppResponse::json(&h.store.completion_percentage())),
        Err(err) => err,
    }
}

/// Page description of the current document at `scale` (1.0 is 96 dpi).
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn render_page(handle: *mut StoreHandle, scale: f32) -> *const c_char {
    match handle_mut(handle, "render_page") {
        Ok(h) => response_to_c_string(&AppResponse::json(&h.store.render(scale))),
        Err(err) => err,
    }
}

/// Exports the document as a versioned envelope.
///
/// # Returns
///
/// `Ok` with `{ "fileName": "biodata_<name>_<date>.json", "envelope": {...} }`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn export_document(handle: *mut StoreHandle) -> *const c_char {
    let handle = match handle_mut(handle, "export_document") {
        Ok(h) => h,
        Err(err) => return err,
    };

    let payload = json!({
        "fileName": handle.store.export_file_name("json"),
        "envelope": handle.store.export_envelope(),
    });
    response_to_c_string(&AppResponse::json(&payload))
}

/// Imports the text of an exported file.
///
/// Nothing is applied unless the file passes every check.
///
/// # Returns
///
/// `Ok` with the imported document, `ImportStructureError` for text that is
/// not JSON or does not look like an export, `ImportVersionError` for an
/// incompatible major version.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn import_document(handle: *mut StoreHandle, text: *const c_char) -> *const c_char {
    let handle = match handle_mut(handle, "import_document") {
        Ok(h) => h,
        Err(err) => return err,
    };

    let text = match c_ptr_to_string(text, "import text") {
        Ok(text) => text,
        Err(err) => return err,
    };

    match handle.store.import_text(&text) {
        Ok(()) => response_to_c_string(&AppResponse::json(handle.store.document())),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Computes the id list after dragging `moved` onto `target`.
///
/// # Parameters
///
/// * `ids_json` - JSON array of ids in current order
/// * `moved` - Id being dragged
/// * `target` - Id it was dropped on
///
/// # Returns
///
/// `Ok` with the new JSON array, ready for a `REORDER_SECTIONS` or
/// `REORDER_FIELDS` action.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn move_item(ids_json: *const c_char, moved: *const c_char, target: *const c_char) -> *const c_char {
    let ids_str = match c_ptr_to_string(ids_json, "ids") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let moved = match c_ptr_to_string(moved, "moved id") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let target = match c_ptr_to_string(target, "target id") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let ids: Vec<String> = match serde_json::from_str(&ids_str) {
        Ok(ids) => ids,
        Err(e) => {
            let error = AppResponse::SerializationError(format!("ids must be a JSON array of strings: {e}"));
            return response_to_c_string(&error);
        }
    };

    let reordered = reorder::move_item(&ids, &moved, &target);
    response_to_c_string(&AppResponse::json(&reordered))
}

/// Runs due autosave and preview work. Call it from the host's event loop.
///
/// # Returns
///
/// `Ok` with `{ "saved": bool | null, "saveError": string | null,
/// "preview": page | null }`. A failed save is reported here and in
/// [`save_status`]; the document stays as it is.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn tick_store(handle: *mut StoreHandle) -> *const c_char {
    let handle = match handle_mut(handle, "tick_store") {
        Ok(h) => h,
        Err(err) => return err,
    };

    let report = handle.store.tick();
    let (saved, save_error) = match &report.saved {
        Some(Ok(())) => (Some(true), None),
        Some(Err(e)) => (Some(false), Some(e.to_string())),
        None => (None, None),
    };
    let payload = json!({
        "saved": saved,
        "saveError": save_error,
        "preview": report.preview.as_deref(),
    });
    response_to_c_string(&AppResponse::json(&payload))
}

/// Writes a pending autosave now.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn flush_store(handle: *mut StoreHandle) -> *const c_char {
    let handle = match handle_mut(handle, "flush_store") {
        Ok(h) => h,
        Err(err) => return err,
    };

    match handle.store.flush() {
        Ok(()) => response_to_c_string(&AppResponse::success("Draft saved")),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// `{ "dirty": bool, "lastSaved": timestamp | null, "lastError": string | null }`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn save_status(handle: *mut StoreHandle) -> *const c_char {
    let handle = match handle_mut(handle, "save_status") {
        Ok(h) => h,
        Err(err) => return err,
    };

    let status = handle.store.save_status();
    let payload = json!({
        "dirty": status.dirty,
        "lastSaved": status.last_saved,
        "lastError": status.last_error.as_ref().map(|e| e.to_string()),
    });
    response_to_c_string(&AppResponse::json(&payload))
}

/// Picks up a draft written by another instance (last writer wins).
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn reload_store(handle: *mut StoreHandle) -> *const c_char {
    match handle_mut(handle, "reload_store") {
        Ok(h) => {
            let changed = h.store.reload_from_storage();
            response_to_c_string(&AppResponse::json(&json!({ "changed": changed })))
        }
        Err(err) => err,
    }
}

/// Shrinks a photo file and returns it as a JPEG data URL, ready for a
/// `SET_PHOTO` action.
///
/// # Arguments
///
/// * `photo_path` - JPEG, PNG, GIF or WebP file chosen by the user
/// * `max_width` / `max_height` - Bounding box in pixels; `0` uses 800
/// * `quality` - JPEG quality 1-100; `0` uses 80
///
/// # Returns
///
/// `Ok` with the data URL, `ValidationError` when the file cannot be decoded
/// or is too large to upload, `BadRequest` when it cannot be read.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn compress_photo(
    photo_path: *const c_char,
    max_width: u32,
    max_height: u32,
    quality: u8,
) -> *const c_char {
    let photo_path = match c_ptr_to_string(photo_path, "photo path") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let bytes = match std::fs::read(&photo_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to read photo {photo_path}: {e}");
            return response_to_c_string(&AppResponse::BadRequest(format!("Cannot read {photo_path}: {e}")));
        }
    };
    if bytes.len() as u64 > MAX_PHOTO_BYTES {
        return response_to_c_string(&AppResponse::ValidationError("Image size must be less than 5MB".to_string()));
    }

    let or_default = |v: u32, d: u32| if v == 0 { d } else { v };
    let quality = if quality == 0 { photo::DEFAULT_QUALITY } else { quality };
    match photo::compress_photo(
        &bytes,
        or_default(max_width, photo::DEFAULT_MAX_WIDTH),
        or_default(max_height, photo::DEFAULT_MAX_HEIGHT),
        quality,
    ) {
        Ok(url) => response_to_c_string(&AppResponse::success(url)),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Starts a PDF export in the background.
///
/// The host draws the page (see [`render_page`]) at the configured export
/// scale and saves it as a PNG or JPEG at `raster_path`. The PDF is written
/// to `output_dir` under the suggested file name; poll [`export_status`] for
/// the outcome.
///
/// # Returns
///
/// `Ok` with the file name once the job has started, `ExportInFlight` while
/// another export runs.
///
/// # Safety
///
/// `handle` must be live; both paths must be valid C strings.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn start_pdf_export(
    handle: *mut StoreHandle,
    raster_path: *const c_char,
    output_dir: *const c_char,
) -> *const c_char {
    let handle = match handle_mut(handle, "start_pdf_export") {
        Ok(h) => h,
        Err(err) => return err,
    };
    let raster_path = match c_ptr_to_string(raster_path, "raster path") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let output_dir = match c_ptr_to_string(output_dir, "output dir") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let request = handle.store.export_request();
    let file_name = request.file_name.clone();
    let builder = PdfPageBuilder::new(handle.store.config().jpeg_quality);

    match handle.export.start(
        request,
        Arc::new(ImageFileRaster::new(raster_path)),
        Arc::new(builder),
        Some(PathBuf::from(output_dir)),
    ) {
        Ok(_) => response_to_c_string(&AppResponse::success(file_name)),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Status of the last export: `{"status":"idle" | "inFlight" | "succeeded" | "failed", ...}`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn export_status(handle: *mut StoreHandle) -> *const c_char {
    match handle_mut(handle, "export_status") {
        Ok(h) => response_to_c_string(&AppResponse::json(&h.export.status())),
        Err(err) => err,
    }
}

/// Flushes any pending autosave and releases the store.
///
/// The handle is invalid afterwards, even when the final save fails.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_store(handle: *mut StoreHandle) -> *const c_char {
    if handle.is_null() {
        let error = AppResponse::BadRequest("Null store pointer passed to close_store".to_string());
        return response_to_c_string(&error);
    }

    let mut handle = unsafe { Box::from_raw(handle) };
    let flushed = handle.store.flush();
    if let Err(e) = handle.store.storage().sync() {
        warn!("Failed to sync storage on close: {e}");
    }
    drop(handle);
    info!("Store closed");

    match flushed {
        Ok(()) => response_to_c_string(&AppResponse::success("Store closed successfully")),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Releases a response string returned by any function of this library.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        drop(CString::from_raw(ptr));
    }
}

/// Converts an [`AppResponse`] to a C-compatible string.
///
/// Returns a null pointer if serialization or C string creation fails. The
/// caller releases the string with [`free_response`].
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

/// Converts a C string pointer to a Rust String.
///
/// # Returns
///
/// * `Ok(String)` - If conversion was successful
/// * `Err(*const c_char)` - A `BadRequest` response naming `field_name`
fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, *const c_char> {
    if ptr.is_null() {
        let error = AppResponse::BadRequest(format!("Null {field_name} pointer"));
        return Err(response_to_c_string(&error));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            let error = AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}"));
            Err(response_to_c_string(&error))
        }
    }
}

fn handle_mut<'a>(handle: *mut StoreHandle, fn_name: &str) -> Result<&'a mut StoreHandle, *const c_char> {
    match unsafe { handle.as_mut() } {
        Some(h) => Ok(h),
        None => {
            let error = AppResponse::BadRequest(format!("Null store pointer passed to {fn_name}"));
            Err(response_to_c_string(&error))
        }
    }
}
