//! `livedoc serve`: REST API, WebSocket sessions and the file watcher.
//!
//! ```text
//! main thread     tiny_http request loop ──► rayon pool ──► api::route
//! ws-accept       WebSocket acceptor     ──► one thread per session
//! watch           tokio runtime          ──► ChangeWatcher ──► SyncHub
//! ```
//!
//! All three share one `Arc<SyncHub>`.

mod api;
mod lifecycle;
mod response;

use crate::{
    config::LivedocConfig,
    core::{is_shutdown, register_server},
    debug,
    document::DocumentStore,
    hub::SyncHub,
    log,
};
use anyhow::{Context, Result};
use crossbeam::channel;
use std::sync::Arc;
use tiny_http::{Request, Server};

/// Worker threads answering REST requests
const REQUEST_THREADS: usize = 4;

/// Run the server until Ctrl+C.
pub fn serve(config: &LivedocConfig) -> Result<()> {
    let path = &config.document.path;
    let store = DocumentStore::open(path)
        .with_context(|| format!("Failed to open document {}", path.display()))?;
    let hub = Arc::new(SyncHub::new(store));

    let (server, addr) = lifecycle::bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    register_server(Arc::clone(&server), shutdown_tx);

    let ws_addr = crate::ws::start_ws_server(
        config.serve.interface,
        config.serve.ws_port,
        Arc::clone(&hub),
    )?;

    let watcher = if config.serve.watch {
        Some(lifecycle::spawn_watcher(
            path,
            config.watch.debounce(),
            Arc::clone(&hub),
            shutdown_rx,
        )?)
    } else {
        debug!("watch"; "disabled");
        None
    };

    log!("serve"; "http://{}", addr);
    log!("ws"; "ws://{}", ws_addr);
    log!("serve"; "document {}", path.display());

    run_request_loop(&server, &hub)?;

    lifecycle::wait_for_shutdown(watcher);
    hub.shutdown();
    Ok(())
}

fn run_request_loop(server: &Server, hub: &Arc<SyncHub>) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .build()
        .context("Failed to create request thread pool")?;

    for request in server.incoming_requests() {
        let hub = Arc::clone(hub);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &hub) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

/// Handle a single HTTP request
fn handle_request(mut request: Request, hub: &SyncHub) -> Result<()> {
    if is_shutdown() {
        return response::respond(request, api::ApiResponse::unavailable());
    }

    let body = match response::read_body(&mut request) {
        Ok(body) => body,
        Err(e) => {
            debug!("api"; "{} {}: {}", request.method(), request.url(), e);
            return response::respond(request, api::ApiResponse::bad_request(e.to_string()));
        }
    };

    let reply = api::route(request.method(), request.url(), &body, hub);
    debug!("api"; "{} {} -> {}", request.method(), request.url(), reply.status);
    response::respond(request, reply)
}
