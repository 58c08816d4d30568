//! Line-oriented chat relay server with JSON message bodies
//!
//! This library provides a small chat relay that speaks a minimal text
//! request/response protocol over TCP: broadcast messages, addressed private
//! messages, reconnect-with-replay, per-client rate limiting, and binary
//! file relay. Clients pull updates by polling; the server never pushes.

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;

#[cfg(test)]
mod smoke_test;

pub use client::RelayClient;
pub use error::{RelayError, Result};
pub use server::RelayServer;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get current timestamp in milliseconds since UNIX epoch
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Relay server configuration
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Address the server listens on
    pub bind_addr: SocketAddr,
    /// Maximum number of broadcast messages kept for replay
    pub buffer_capacity: usize,
    /// Messages a client may send per rate window
    pub message_limit: u32,
    /// Length of the rate window
    pub rate_window: Duration,
    /// Upload size ceiling, enforced by the sending client only
    pub max_upload_size: usize,
    /// Directory where uploaded artifacts are mirrored
    pub files_dir: PathBuf,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".parse().unwrap(),
            buffer_capacity: 20,
            message_limit: 20,
            rate_window: Duration::from_secs(3600),
            max_upload_size: 16 * 1024 * 1024, // 16MB
            files_dir: PathBuf::from("relay-files"),
        }
    }
}
