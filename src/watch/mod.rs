//! Change Watcher
//!
//! Observes the backing file for modifications made outside the store and
//! emits one debounced "reload needed" per burst of OS events.
//!
//! Architecture:
//! ```text
//! notify (sync) → bridge thread → tokio mpsc → Debouncer → on_change()
//! ```
//!
//! The parent directory is watched non-recursively so that editors which
//! save by writing a temp file and renaming it over the document are still
//! seen. Events for sibling files are dropped by the debouncer.

mod debouncer;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, oneshot};

use crate::{debug, log};
use debouncer::Debouncer;

/// Watches one file for external modifications.
pub struct ChangeWatcher {
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    watcher: RecommendedWatcher,
    /// Directory actually registered with the OS
    dir: PathBuf,
    debouncer: Debouncer,
}

impl ChangeWatcher {
    /// Start watching `file` immediately.
    ///
    /// Events buffer in the notify channel until [`run`](Self::run) starts
    /// consuming them, so nothing written in between is lost.
    pub fn new(file: &Path, debounce: Duration) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        let dir = watch_dir(file);
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        debug!("watch"; "watching {}", file.display());

        Ok(Self {
            notify_rx,
            watcher,
            dir,
            debouncer: Debouncer::new(file, debounce),
        })
    }

    /// Run the debounce loop until `stop` fires (or its sender is dropped).
    ///
    /// `on_change` is called once per debounced burst. It must be idempotent:
    /// duplicate notifications are possible.
    pub async fn run<F>(self, on_change: F, mut stop: oneshot::Receiver<()>)
    where
        F: Fn() + Send + 'static,
    {
        let Self {
            notify_rx,
            mut watcher,
            dir,
            mut debouncer,
        } = self;

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);

        // Spawn a thread to poll notify events and send to async channel
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break; // Receiver dropped
                        }
                    }
                    Err(e) => log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            tokio::select! {
                biased;
                _ = &mut stop => break,
                Some(event) = async_rx.recv() => {
                    debouncer.add_event(&event);
                }
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    if debouncer.take_if_ready() {
                        on_change();
                    }
                }
            }
        }

        if let Err(e) = watcher.unwatch(&dir) {
            log!("watch"; "failed to stop watcher: {}", e);
        } else {
            debug!("watch"; "stopped");
        }
    }
}

/// Directory to register with the OS for `file`.
fn watch_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
