//! The authoritative in-memory document and its side effects.
//!
//! [`BiodataStore`] owns exactly one [`Biodata`] and advances it only through
//! [`reduce`]. Each accepted action
//!
//! 1. replaces the document atomically (readers never observe a partial edit),
//! 2. notifies subscribers with [`StoreEvent::Changed`],
//! 3. re-arms two independent debouncers: autosave and preview.
//!
//! The store is cooperative: the host calls [`BiodataStore::tick`] from its
//! event loop, and due effects run there. Persistence failures are recorded
//! in [`SaveStatus`] and reported to subscribers; they never roll back or
//! block editing.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::biodata_model::Biodata;
use crate::codec::{
    export_envelope, export_file_name, export_json, parse_envelope, parse_envelope_text, ExportEnvelope,
};
use crate::config::StoreConfig;
use crate::debounce::Debouncer;
use crate::defaults::create_initial_biodata;
use crate::error::{ActionError, ImportError, StorageError};
use crate::export::ExportRequest;
use crate::reducer::{check_identity_invariants, reduce, Action, Transition};
use crate::render::{render_page, RenderedPage};
use crate::storage::DocumentStorage;
use crate::validation::{completion_percentage, validate_document, DocumentValidation};

pub type SubscriptionId = u64;

type Listener = Box<dyn FnMut(&StoreEvent) + Send>;

/// Notifications delivered to subscribers.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// An action was applied.
    Changed { action: &'static str, updated_at: DateTime<Utc> },
    Saved { at: DateTime<Utc> },
    SaveFailed(StorageError),
    PreviewReady(Arc<RenderedPage>),
    /// The document was replaced from storage after an external write.
    Reloaded,
}

/// Autosave bookkeeping exposed to the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveStatus {
    /// The in-memory document has changes not yet written.
    pub dirty: bool,
    pub last_saved: Option<DateTime<Utc>>,
    pub last_error: Option<StorageError>,
}

/// Effects that ran during one [`BiodataStore::tick`].
#[derive(Debug, Default)]
pub struct TickReport {
    pub saved: Option<Result<(), StorageError>>,
    pub preview: Option<Arc<RenderedPage>>,
}

pub struct BiodataStore<S: DocumentStorage> {
    document: Biodata,
    storage: S,
    config: StoreConfig,
    autosave: Debouncer,
    preview: Debouncer,
    save_status: SaveStatus,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
}

impl<S: DocumentStorage> BiodataStore<S> {
    /// Opens the store, restoring the saved draft when there is a usable one
    /// and starting from the default document otherwise.
    pub fn open(storage: S, config: StoreConfig) -> Self {
        let document = match load_document(&storage, &config.storage_key) {
            Some(doc) => {
                info!("Restored draft {} from storage", doc.id);
                doc
            }
            None => {
                info!("No usable draft in storage, starting a new document");
                new_document()
            }
        };

        Self {
            document,
            autosave: Debouncer::new(config.autosave_delay()),
            preview: Debouncer::new(config.preview_delay()),
            storage,
            config,
            save_status: SaveStatus::default(),
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn document(&self) -> &Biodata {
        &self.document
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn save_status(&self) -> &SaveStatus {
        &self.save_status
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&StoreEvent) + Send + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn dispatch(&mut self, action: Action) -> Result<(), ActionError> {
        self.dispatch_at(action, Instant::now())
    }

    /// Applies `action`, scheduling effects relative to `at`.
    pub fn dispatch_at(&mut self, action: Action, at: Instant) -> Result<(), ActionError> {
        let name = action.name();
        let transition = Transition {
            now: Utc::now(),
            fresh_id: Uuid::new_v4().to_string(),
        };

        let next = reduce(&self.document, action, transition).map_err(|e| {
            warn!("Rejected {name}: {e}");
            e
        })?;
        self.document = next;
        debug!("Applied {name}");

        self.save_status.dirty = true;
        self.autosave.schedule(at);
        self.preview.schedule(at);

        let updated_at = self.document.updated_at;
        self.notify(&StoreEvent::Changed { action: name, updated_at });
        Ok(())
    }

    pub fn tick(&mut self) -> TickReport {
        self.tick_at(Instant::now())
    }

    /// Runs every effect whose debounce window has elapsed at `at`.
    pub fn tick_at(&mut self, at: Instant) -> TickReport {
        let mut report = TickReport::default();

        if self.autosave.poll(at) {
            report.saved = Some(self.persist());
        }

        if self.preview.poll(at) {
            let page = Arc::new(render_page(&self.document, self.config.preview_scale));
            self.notify(&StoreEvent::PreviewReady(Arc::clone(&page)));
            report.preview = Some(page);
        }

        report
    }

    /// Writes unsaved changes immediately, including changes whose autosave
    /// already failed. Does nothing when the stored draft is current.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        let pending = self.autosave.cancel();
        if pending || self.save_status.dirty {
            self.persist()
        } else {
            Ok(())
        }
    }

    fn persist(&mut self) -> Result<(), StorageError> {
        let result = serde_json::to_string(&self.document)
            .map_err(StorageError::from)
            .and_then(|json| self.storage.write(&self.config.storage_key, &json));

        match &result {
            Ok(()) => {
                let at = Utc::now();
                self.save_status = SaveStatus {
                    dirty: false,
                    last_saved: Some(at),
                    last_error: None,
                };
                debug!("Saved draft {}", self.document.id);
                self.notify(&StoreEvent::Saved { at });
            }
            Err(e) => {
                warn!("Failed to save draft to storage: {e}");
                self.save_status.last_error = Some(e.clone());
                self.notify(&StoreEvent::SaveFailed(e.clone()));
            }
        }
        result
    }

    /// Validates raw file text as an envelope and imports it.
    pub fn import_text(&mut self, text: &str) -> Result<(), ImportError> {
        let envelope = parse_envelope_text(text)?;
        self.apply_import(envelope)
    }

    /// Validates parsed JSON as an envelope and imports it.
    pub fn import_value(&mut self, value: JsonValue) -> Result<(), ImportError> {
        let envelope = parse_envelope(value)?;
        self.apply_import(envelope)
    }

    fn apply_import(&mut self, envelope: ExportEnvelope) -> Result<(), ImportError> {
        let id = envelope.data.id.clone();
        self.dispatch(Action::ImportData { data: Box::new(envelope.data) })
            .map_err(|e| ImportError::Structure(e.to_string()))?;
        info!("Imported biodata {id} (export version {})", envelope.version);
        Ok(())
    }

    pub fn export_envelope(&self) -> ExportEnvelope {
        export_envelope(&self.document, Utc::now())
    }

    /// Pretty-printed envelope, the content of a `.json` export file.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        export_json(&self.document, Utc::now())
    }

    /// Suggested file name for an export with `extension`.
    pub fn export_file_name(&self, extension: &str) -> String {
        export_file_name(&self.document, extension, Utc::now())
    }

    pub fn reset(&mut self) -> Result<(), ActionError> {
        self.dispatch(Action::Reset)
    }

    /// Reconciles with a write made by another process: the stored draft
    /// replaces the in-memory one (last writer wins) and any pending autosave
    /// is dropped. Returns whether the document changed.
    pub fn reload_from_storage(&mut self) -> bool {
        let Some(stored) = load_document(&self.storage, &self.config.storage_key) else {
            return false;
        };
        if stored == self.document {
            return false;
        }

        self.autosave.cancel();
        self.document = stored;
        self.save_status.dirty = false;
        self.preview.schedule(Instant::now());
        info!("Reloaded draft {} after an external change", self.document.id);
        self.notify(&StoreEvent::Reloaded);
        true
    }

    pub fn validate(&self) -> DocumentValidation {
        validate_document(&self.document)
    }

    pub fn completion_percentage(&self) -> u8 {
        completion_percentage(&self.document)
    }

    pub fn render(&self, scale: f32) -> RenderedPage {
        render_page(&self.document, scale)
    }

    /// Snapshot for a PDF export at the configured export scale.
    pub fn export_request(&self) -> ExportRequest {
        ExportRequest {
            page: render_page(&self.document, self.config.export_scale),
            scale: self.config.export_scale,
            file_name: self.export_file_name("pdf"),
        }
    }

    fn notify(&mut self, event: &StoreEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(event);
        }
    }
}

fn new_document() -> Biodata {
    create_initial_biodata(Uuid::new_v4().to_string(), Utc::now())
}

/// Reads the stored draft. Missing, unparsable or malformed values yield
/// `None`; a storage failure is logged and treated the same way.
fn load_document<S: DocumentStorage>(storage: &S, key: &str) -> Option<Biodata> {
    let raw = match storage.read(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to read draft from storage: {e}");
            return None;
        }
    };

    let value: JsonValue = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("Stored draft is not valid JSON: {e}");
            return None;
        }
    };

    let has_id = value
        .get("id")
        .and_then(JsonValue::as_str)
        .is_some_and(|id| !id.is_empty());
    let has_sections = value.get("sections").is_some_and(JsonValue::is_array);
    if !has_id || !has_sections {
        warn!("Stored draft is missing its id or sections");
        return None;
    }

    let doc: Biodata = match serde_json::from_value(value) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Stored draft does not match the document schema: {e}");
            return None;
        }
    };
    if let Err(e) = check_identity_invariants(&doc) {
        warn!("Stored draft breaks id uniqueness: {e}");
        return None;
    }
    Some(doc)
}
