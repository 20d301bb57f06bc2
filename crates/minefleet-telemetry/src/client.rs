//! Stats API client
//!
//! The device accepts one JSON command per connection, answers with a JSON
//! body followed by a single NUL byte and then closes the stream. There is no
//! length header; end of stream is the frame boundary.

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::error::TelemetryError;

/// Commands understood by the stats API
pub mod commands {
    /// Hashboards, sensors and fans in one round trip
    pub const STATS: &str = "devs+temps+fans";
    /// Daemon identification
    pub const VERSION: &str = "version";
}

/// Port the stats API listens on
pub const DEFAULT_PORT: u16 = 4028;

/// Request/response access to a device's stats API
#[async_trait]
pub trait Telemetry: Send + Sync {
    /// Send `command` to the device at `address` and return the decoded reply
    async fn fetch(&self, address: &str, command: &str) -> Result<Value, TelemetryError>;
}

/// Drop the trailing sentinel from a complete frame and decode the JSON body
///
/// The device terminates each reply with one byte after the JSON. Whatever
/// that byte is, a final byte other than `}` or `]` is not part of the body.
///
/// # Errors
/// Returns `TelemetryError::Protocol` if the body is empty or not JSON.
pub fn decode_frame(frame: &[u8]) -> Result<Value, TelemetryError> {
    let body = match frame.split_last() {
        Some((b'}' | b']', _)) => frame,
        Some((_, body)) => body,
        None => return Err(TelemetryError::Protocol("empty response".to_string())),
    };

    serde_json::from_slice(body).map_err(|e| TelemetryError::Protocol(e.to_string()))
}

/// TCP client for the stats API
///
/// Stateless: every call opens its own connection.
#[derive(Debug, Clone)]
pub struct TelemetryClient {
    /// Stats API port
    port: u16,
    /// Bound on connect plus the full exchange
    timeout: Duration,
}

impl TelemetryClient {
    /// Create a new client for the default port
    #[must_use]
    pub fn new() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(5),
        }
    }

    /// Set stats API port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set exchange timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn exchange(&self, address: &str, command: &str) -> Result<Vec<u8>, TelemetryError> {
        let mut stream = TcpStream::connect((address, self.port))
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::ConnectionRefused => TelemetryError::ConnectionRefused(e.to_string()),
                _ => TelemetryError::Connectivity(e.to_string()),
            })?;

        let request = json!({ "command": command }).to_string();
        stream
            .write_all(request.as_bytes())
            .await
            .map_err(|e| TelemetryError::Connectivity(e.to_string()))?;

        let mut frame = Vec::with_capacity(4096);
        stream
            .read_to_end(&mut frame)
            .await
            .map_err(|e| TelemetryError::Connectivity(e.to_string()))?;

        Ok(frame)
    }
}

impl Default for TelemetryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Telemetry for TelemetryClient {
    #[instrument(skip(self), fields(port = self.port))]
    async fn fetch(&self, address: &str, command: &str) -> Result<Value, TelemetryError> {
        let frame = timeout(self.timeout, self.exchange(address, command))
            .await
            .map_err(|_| TelemetryError::Timeout(self.timeout))??;

        debug!(bytes = frame.len(), "stats response received");

        decode_frame(&frame)
    }
}
