//! `livedoc init`: create the backing file.

use crate::{config::LivedocConfig, document::DocumentStore, log};
use anyhow::{Context, Result};
use std::path::Path;

/// Create the backing file with an empty array unless it already exists.
///
/// An existing file is left untouched but must hold valid JSON.
pub fn init(config: &LivedocConfig) -> Result<()> {
    let path = &config.document.path;
    if init_document(path)? {
        log!("init"; "created {}", path.display());
    } else {
        log!("init"; "{} already exists, left unchanged", path.display());
    }
    Ok(())
}

/// Returns `true` when a new file was written.
fn init_document(path: &Path) -> Result<bool> {
    let existed = path.exists();
    DocumentStore::open(path)
        .with_context(|| format!("Failed to initialize {}", path.display()))?;
    Ok(!existed)
}
