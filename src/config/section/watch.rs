//! `[watch]` section configuration.
//!
//! ```toml
//! [watch]
//! debounce_ms = 100           # Quiet period before an external edit is reloaded
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Upper bound for `debounce_ms`
const MAX_DEBOUNCE_MS: u64 = 10_000;

/// External-change watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Debounce window in milliseconds.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100 }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub(in crate::config) fn validate(&self, errors: &mut Vec<String>) {
        if self.debounce_ms > MAX_DEBOUNCE_MS {
            errors.push(format!(
                "watch.debounce_ms must be at most {MAX_DEBOUNCE_MS} (got {})",
                self.debounce_ms
            ));
        }
    }
}
