//! Document store error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by [`DocumentStore`](super::DocumentStore).
///
/// None of these leave the store in a new state: the cached document is
/// always the last one that was durably committed or successfully read.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("`{path}` is not valid JSON: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read `{0}`")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("failed to write `{0}`")]
    Persistence(PathBuf, #[source] std::io::Error),

    #[error("document cannot be encoded as JSON: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StoreError {
    /// Short reason suitable for an `error` message sent to a viewer.
    pub fn reason(&self) -> String {
        match self {
            Self::Decode { source, .. } => format!("stored document is not valid JSON: {source}"),
            Self::Read(..) => "stored document could not be read".to_string(),
            Self::Persistence(..) => "update could not be saved".to_string(),
            Self::Encode(e) => format!("update is not a valid JSON document: {e}"),
        }
    }
}
