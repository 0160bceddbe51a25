//! `[document]` section configuration.
//!
//! ```toml
//! [document]
//! path = "data/data.json"     # Relative to the directory holding livedoc.toml
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Backing file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Backing JSON file. Absolute after config loading.
    pub path: PathBuf,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data").join("data.json"),
        }
    }
}

impl DocumentConfig {
    pub(in crate::config) fn validate(&self, errors: &mut Vec<String>) {
        if self.path.is_dir() {
            errors.push(format!(
                "document.path `{}` is a directory, expected a JSON file",
                self.path.display()
            ));
        }
    }
}
