//! Server lifecycle management.

use crate::{debug, hub::SyncHub, log, watch::ChangeWatcher};
use anyhow::{Context, Result};
use crossbeam::channel::{Receiver, TryRecvError};
use std::{
    net::{IpAddr, SocketAddr},
    path::Path,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};
use tiny_http::Server;

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// How often the watcher runtime checks for Ctrl+C
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Grace period for the watcher loop to stop
const WATCHER_GRACE: Duration = Duration::from_millis(500);

/// Bind to the specified interface and port, with automatic port retry.
///
/// Returns the address actually bound, which differs from the request for
/// port 0.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let attempts = if base_port == 0 { 1 } else { MAX_PORT_RETRIES };
    let mut last_error = None;

    for offset in 0..attempts {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                let bound = server.server_addr().to_ip().unwrap_or(addr);
                return Ok((server, bound));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        attempts,
        base_port,
        base_port.saturating_add(attempts - 1),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

/// Start watching the backing file on a dedicated tokio runtime.
///
/// The watcher is registered before this returns, so edits made after the
/// server reports ready are never missed.
pub fn spawn_watcher(
    file: &Path,
    debounce: Duration,
    hub: Arc<SyncHub>,
    shutdown_rx: Receiver<()>,
) -> Result<JoinHandle<()>> {
    let watcher = ChangeWatcher::new(file, debounce)
        .with_context(|| format!("Failed to watch {}", file.display()))?;

    let handle = thread::Builder::new()
        .name("watch".into())
        .spawn(move || run_watcher(watcher, hub, shutdown_rx))?;
    Ok(handle)
}

fn run_watcher(watcher: ChangeWatcher, hub: Arc<SyncHub>, shutdown_rx: Receiver<()>) {
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log!("watch"; "failed to create tokio runtime: {}", e);
            return;
        }
    };

    rt.block_on(async move {
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();
        // Reloads touch the disk and the hub's locks: keep them off the workers
        let on_change = move || {
            let hub = Arc::clone(&hub);
            tokio::task::spawn_blocking(move || hub.on_external_change());
        };
        let task = tokio::spawn(watcher.run(on_change, stop_rx));

        loop {
            match shutdown_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => tokio::time::sleep(SHUTDOWN_POLL).await,
            }
        }

        debug!("watch"; "shutdown signal received");
        let _ = stop_tx.send(());
        let _ = tokio::time::timeout(WATCHER_GRACE, task).await;
    });
}

/// Wait for the watcher thread to finish (max 2 seconds).
pub fn wait_for_shutdown(handle: Option<JoinHandle<()>>) {
    let Some(handle) = handle else { return };

    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
}
