//! Sync Hub - document store, sessions, and fan-out tied together
//!
//! ```text
//! viewer --update_request--> SyncHub --replace--> DocumentStore
//! REST   --POST /api/data--> SyncHub                  |
//! watcher --external change-> SyncHub --reload--------+
//!                               |
//!                               +--data_update--> ConnectionRegistry --> viewers
//! ```
//!
//! Every document mutation and the broadcast that announces it run under one
//! ordering lock, so all sessions observe updates in commit order. Session
//! admission takes the same lock: a viewer's `initial_data` is queued before
//! it can receive any broadcast.
//!
//! # Modules
//!
//! - `message` - JSON envelopes (initial_data, data_update, error, update_request)
//! - `registry` - connected sessions and per-session push

pub mod message;
pub mod registry;


pub use message::{ClientMessage, Frame, Origin, ProtocolError, ServerMessage};
pub use registry::{ConnectionRegistry, Push, SessionId};

use parking_lot::Mutex;
use serde_json::Value;

use crate::document::{Document, DocumentStore, StoreError};
use crate::predict::{PredictError, Predictor};
use crate::{debug, log};

/// Real-time synchronization hub for one shared document.
pub struct SyncHub {
    store: DocumentStore,
    registry: ConnectionRegistry,
    /// Serializes "mutate + broadcast" and "snapshot + register"
    order: Mutex<()>,
}

impl SyncHub {
    pub fn new(store: DocumentStore) -> Self {
        Self {
            store,
            registry: ConnectionRegistry::new(),
            order: Mutex::new(()),
        }
    }

    /// Current document.
    pub fn read(&self) -> Document {
        self.store.read()
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Admit a new session: send its `initial_data`, then register it.
    pub fn connect(&self, push: Box<dyn Push>) -> SessionId {
        let id = SessionId::new();

        let _order = self.order.lock();
        let snapshot = ServerMessage::initial_data(self.store.read()).to_frame();
        if let Err(e) = push.push(snapshot) {
            debug!("hub"; "initial data to {} failed: {}", id, e);
        }
        self.registry.register(id, push);

        debug!("hub"; "session {} active ({} connected)", id, self.registry.len());
        id
    }

    /// Forget a session after its transport closed. Idempotent.
    pub fn disconnect(&self, id: SessionId) {
        if let Some(session) = self.registry.unregister(id) {
            debug!("hub"; "session {} closed after {:.1?}", id, session.connected_at().elapsed());
        }
    }

    /// Handle one inbound text frame from a session.
    pub fn handle_message(&self, id: SessionId, text: &str) {
        match ClientMessage::parse(text) {
            Ok(ClientMessage::UpdateRequest { data }) => {
                if let Err(e) = self.apply_update(Origin::Session(id), &data) {
                    log!("hub"; "update from {} rejected: {}", id, e);
                    self.reply_error(id, e.reason());
                }
            }
            Err(e) => self.reject(id, &e),
        }
    }

    /// Report an inbound protocol problem to the sending session only.
    pub fn reject(&self, id: SessionId, error: &ProtocolError) {
        debug!("hub"; "protocol error from {}: {}", id, error);
        self.reply_error(id, error.to_string());
    }

    fn reply_error(&self, id: SessionId, message: String) {
        let frame = ServerMessage::error(message).to_frame();
        if let Err(e) = self.registry.send_to(id, frame) {
            debug!("hub"; "error reply to {} failed: {}", id, e);
        }
    }

    // =========================================================================
    // Document mutations
    // =========================================================================

    /// Replace the document and announce it to every session.
    ///
    /// Shared by session `update_request`s and REST writes. A failed replace
    /// leaves every viewer's view unchanged.
    pub fn apply_update(&self, origin: Origin, document: &Document) -> Result<Document, StoreError> {
        let _order = self.order.lock();
        let committed = self.store.replace(document)?;
        self.announce(&committed, &origin);
        Ok(committed)
    }

    /// Backing file changed outside the store: reload and announce.
    ///
    /// A corrupt or unreadable file is logged and skipped; viewers keep the
    /// last good document. A reload that matches what viewers already have
    /// (such as the echo of the store's own write) is not announced.
    pub fn on_external_change(&self) {
        let _order = self.order.lock();
        let previous = self.store.read();
        match self.store.reload() {
            Ok(document) if document == previous => {
                debug!("hub"; "{} unchanged, nothing to announce", self.file_name());
            }
            Ok(document) => {
                crate::logger::status_success(&format!("reloaded {}", self.file_name()));
                self.announce(&document, &Origin::External);
            }
            Err(e) => {
                crate::logger::status_error(&format!("kept previous {}", self.file_name()), &e.to_string());
            }
        }
    }

    fn announce(&self, document: &Document, origin: &Origin) {
        let frame = ServerMessage::data_update(document.clone(), origin).to_frame();
        let report = self.registry.broadcast(&frame);
        debug!("hub"; "update from {} sent to {} session(s), {} failed, {} dropped",
            origin, report.delivered, report.failed.len(), report.evicted.len());
    }

    fn file_name(&self) -> String {
        self.store
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.store.path().display().to_string())
    }

    // =========================================================================
    // Collaborators
    // =========================================================================

    /// Run a predictor over the current document and relay its summary.
    pub fn predict(&self, predictor: &dyn Predictor) -> Result<Value, PredictError> {
        match self.store.read() {
            Value::Array(records) => predictor.predict(&records),
            _ => Err(PredictError::NotAnArray),
        }
    }

    /// Close every session. Pending broadcasts are not flushed.
    pub fn shutdown(&self) {
        let closed = self.registry.close_all();
        if closed > 0 {
            log!("hub"; "closed {} session(s)", closed);
        }
    }
}
