//! Shared document store.
//!
//! Owns the canonical in-memory copy of the shared JSON document and the file
//! that backs it. Every entry point goes through one mutex, and disk I/O
//! happens while holding it, so two writers can never interleave partial
//! writes and readers never see a document that was not committed.
//!
//! ```text
//! read()     ──► cache
//! replace()  ──► encode ──► temp file ──► rename ──► cache
//! reload()   ──► backing file ──► decode ──► cache
//! ```

mod error;

pub use error::StoreError;

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

/// The shared document: any JSON value, usually an array of records.
pub type Document = Value;

/// Single-document store with a JSON file as durability layer.
#[derive(Debug)]
pub struct DocumentStore {
    path: PathBuf,
    current: Mutex<Document>,
}

impl DocumentStore {
    /// Open the store backed by `path`.
    ///
    /// A missing file is created (with its parent directories) containing an
    /// empty array. An existing file must hold valid JSON.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let document = if path.exists() {
            read_document(&path)?
        } else {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Persistence(path.clone(), e))?;
            }
            let empty = Document::Array(Vec::new());
            write_document(&path, &empty)?;
            crate::debug!("store"; "created {}", path.display());
            empty
        };

        Ok(Self {
            path,
            current: Mutex::new(document),
        })
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current committed document. Never touches the disk.
    pub fn read(&self) -> Document {
        self.current.lock().clone()
    }

    /// Replace the whole document and persist it.
    ///
    /// Returns the committed document. On failure the cache is untouched.
    pub fn replace<T: Serialize + ?Sized>(&self, document: &T) -> Result<Document, StoreError> {
        let document = serde_json::to_value(document).map_err(StoreError::Encode)?;

        let mut current = self.current.lock();
        write_document(&self.path, &document)?;
        *current = document.clone();
        Ok(document)
    }

    /// Re-read the backing file into the cache.
    ///
    /// Keeps the last known good document if the file cannot be read or
    /// decoded.
    pub fn reload(&self) -> Result<Document, StoreError> {
        let mut current = self.current.lock();
        let document = read_document(&self.path)?;
        *current = document.clone();
        Ok(document)
    }
}

fn read_document(path: &Path) -> Result<Document, StoreError> {
    let content = fs::read(path).map_err(|e| StoreError::Read(path.to_path_buf(), e))?;
    serde_json::from_slice(&content).map_err(|source| StoreError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Whole-file overwrite through a sibling temp file and a rename, so the
/// watcher and external readers never observe a half-written document.
fn write_document(path: &Path, document: &Document) -> Result<(), StoreError> {
    let body = serde_json::to_vec_pretty(document).map_err(StoreError::Encode)?;
    let tmp = temp_path(path);

    fs::write(&tmp, &body).map_err(|e| StoreError::Persistence(path.to_path_buf(), e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StoreError::Persistence(path.to_path_buf(), e)
    })
}

/// `dir/data.json` -> `dir/.data.json.tmp`
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}
