//! WebSocket transport for viewer sessions
//!
//! ```text
//! acceptor thread ──► session thread (one per viewer)
//!                        ├─ drains outbound queue (crossbeam) → ws.send
//!                        └─ ws.read (short timeout) → SyncHub::handle_message
//! ```
//!
//! The hub never touches a socket: it pushes [`Frame`](crate::hub::Frame)s
//! into the session's queue and the session thread writes them in order.

mod server;
mod session;

#[cfg(test)]
mod tests;

pub use server::start_ws_server;
