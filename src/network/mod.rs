//! Network module - Handles TCP communication with the CDE
//!
//! Provides:
//! - Framed connections over any async byte stream
//! - The request/response client for node operations

mod client;
mod connection;

pub use client::*;
pub use connection::*;

use std::net::SocketAddr;
use std::time::Duration;

use crate::protocol::{DEFAULT_HOST, DEFAULT_MAX_FRAME_SIZE, DEFAULT_PORT};

/// Configuration for network operations
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// CDE host name or address
    pub host: String,
    /// CDE inbound message port
    pub port: u16,
    /// Deadline for establishing the TCP connection
    pub connect_timeout: Duration,
    /// Deadline for sending a frame and for receiving one
    pub io_timeout: Duration,
    /// Largest frame accepted in either direction
    pub max_frame_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(5),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl NetworkConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self.io_timeout = timeout;
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }
}

/// Resolve a hostname to a socket address
pub async fn resolve_host(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    use tokio::net::lookup_host;

    let mut addrs = lookup_host((host, port)).await?;

    addrs.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Could not resolve host: {}", host),
        )
    })
}
