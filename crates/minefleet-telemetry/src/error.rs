//! Error types for minefleet-telemetry

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur talking to a device's stats API
#[derive(Error, Debug, Clone)]
pub enum TelemetryError {
    /// The device actively refused the connection
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// Connect or read did not finish in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Any other network failure
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// Response was not JSON or lacked required sections
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TelemetryError {
    /// Whether the device refused the connection outright
    #[must_use]
    pub fn is_refused(&self) -> bool {
        matches!(self, TelemetryError::ConnectionRefused(_))
    }

    /// Whether the call ran out of time
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, TelemetryError::Timeout(_))
    }

    /// Whether the failure happened before a response was read
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        !matches!(self, TelemetryError::Protocol(_))
    }
}
