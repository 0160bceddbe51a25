//! `[serve]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"     # Network interface (127.0.0.1 = localhost only)
//! port = 8000                 # HTTP port (REST API)
//! ws_port = 8001              # WebSocket port (live sessions)
//! watch = true                # Pick up edits made outside the server
//! ```
//!
//! Use `interface = "0.0.0.0"` to make the server accessible from LAN.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    /// HTTP port number.
    pub port: u16,

    /// WebSocket port number.
    pub ws_port: u16,

    /// Enable the external-change watcher.
    pub watch: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 8000,
            ws_port: 8001,
            watch: true,
        }
    }
}

impl ServeConfig {
    pub(in crate::config) fn validate(&self, errors: &mut Vec<String>) {
        if self.port == self.ws_port && self.port != 0 {
            errors.push(format!(
                "serve.port and serve.ws_port must differ (both are {})",
                self.port
            ));
        }
    }
}
