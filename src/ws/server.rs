use std::net::{IpAddr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::core::is_shutdown;
use crate::hub::SyncHub;
use crate::{debug, log};

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// Accept loop poll interval while idle
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// Start the WebSocket acceptor and return the bound address.
///
/// Each accepted stream gets its own session thread. The acceptor stops once
/// shutdown has been requested.
pub fn start_ws_server(interface: IpAddr, base_port: u16, hub: Arc<SyncHub>) -> Result<SocketAddr> {
    let (listener, addr) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
    listener.set_nonblocking(true)?;

    std::thread::Builder::new()
        .name("ws-accept".into())
        .spawn(move || accept_loop(listener, hub))?;

    Ok(addr)
}

fn accept_loop(listener: TcpListener, hub: Arc<SyncHub>) {
    while !is_shutdown() {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!("ws"; "connection from {}", peer);

                // Handshake and session I/O use blocking mode with a read timeout
                if let Err(e) = stream.set_nonblocking(false) {
                    log!("ws"; "failed to configure {}: {}", peer, e);
                    continue;
                }

                let hub = Arc::clone(&hub);
                let spawned = std::thread::Builder::new()
                    .name(format!("ws-{peer}"))
                    .spawn(move || super::session::run(stream, peer, hub));
                if let Err(e) = spawned {
                    log!("ws"; "failed to start session for {}: {}", peer, e);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL);
            }
            Err(e) => {
                log!("ws"; "accept error: {}", e);
                std::thread::sleep(ACCEPT_POLL);
            }
        }
    }
    debug!("ws"; "acceptor stopped");
}

/// Try binding to port, retry with incremented port if in use.
///
/// Port 0 asks the OS for any free port and is never retried.
pub(crate) fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(TcpListener, SocketAddr)> {
    let attempts = if base_port == 0 { 1 } else { max_retries };
    let mut last_error = None;

    for offset in 0..attempts {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(SocketAddr::new(interface, port)) {
            Ok(listener) => {
                let addr = listener.local_addr()?;
                if offset > 0 {
                    log!("ws"; "port {} in use, using {}", base_port, addr.port());
                }
                return Ok((listener, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "failed to bind WebSocket server after {} attempts: {}",
        attempts,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
