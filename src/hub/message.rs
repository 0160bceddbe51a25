//! Sync Message Protocol
//!
//! JSON envelopes exchanged with viewers over WebSocket text frames.
//!
//! # Message Types
//!
//! Server → viewer:
//! - `initial_data`: first message of every session, full document
//! - `data_update`: document changed, full document plus origin
//! - `error`: the viewer's last message was rejected
//!
//! Viewer → server:
//! - `update_request`: replace the whole document

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::registry::SessionId;
use crate::document::Document;

/// Message sent from the hub to a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Baseline snapshot, always the first message a session receives
    InitialData { data: Document },

    /// Document was replaced
    DataUpdate {
        data: Document,
        /// Human-readable origin
        message: String,
        /// Machine-readable origin tag (`session:<id>`, `rest`, `external`)
        source: String,
    },

    /// The viewer's request was rejected
    Error { message: String },
}

impl ServerMessage {
    pub fn initial_data(data: Document) -> Self {
        Self::InitialData { data }
    }

    pub fn data_update(data: Document, origin: &Origin) -> Self {
        Self::DataUpdate {
            data,
            message: origin.describe(),
            source: origin.to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize once for fan-out to many sessions.
    pub fn to_frame(&self) -> Frame {
        // A Value-backed enum with string keys always serializes
        let text = serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"type":"error","message":"internal encoding error"}"#.to_string());
        Frame::Text(Arc::from(text))
    }
}

/// Message sent from a viewer to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Replace the whole document
    UpdateRequest { data: Document },
}

impl ClientMessage {
    /// Parse an inbound text frame.
    ///
    /// Distinguishes text that is not JSON at all from JSON that is not a
    /// known envelope, so the error sent back can say which.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(ProtocolError::Decode)?;

        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .map(str::to_owned)
            .ok_or(ProtocolError::MissingType)?;

        serde_json::from_value(value).map_err(|e| match kind.as_str() {
            "update_request" => ProtocolError::Malformed(kind, e.to_string()),
            _ => ProtocolError::Unsupported(kind),
        })
    }
}

/// Inbound envelope problems. Reported to the sending session only.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("message has no `type` field")]
    MissingType,

    #[error("unsupported message type `{0}`")]
    Unsupported(String),

    #[error("malformed `{0}` message: {1}")]
    Malformed(String, String),

    #[error("binary frames are not supported")]
    Binary,
}

/// Where a document change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// `update_request` from a connected viewer
    Session(SessionId),
    /// REST `POST`
    Rest,
    /// Backing file edited outside the store
    External,
}

impl Origin {
    /// Text for the `message` field of a `data_update`.
    pub fn describe(&self) -> String {
        match self {
            Self::Session(id) => format!("data updated by session {id}"),
            Self::Rest => "data updated via REST API".to_string(),
            Self::External => "data file changed on disk".to_string(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(id) => write!(f, "session:{id}"),
            Self::Rest => f.write_str("rest"),
            Self::External => f.write_str("external"),
        }
    }
}

/// Pre-serialized unit of outbound delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// JSON text, shared across every recipient of a broadcast
    Text(Arc<str>),
    /// Ask the session worker to close the transport
    Close,
}
