//! Error types for minefleet-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during remote or local execution
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Failed to connect to remote host
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Session channel failed mid-operation
    #[error("channel error: {0}")]
    Channel(String),

    /// Remote step exited non-zero where success was required
    #[error("command execution failed: {status} - {stderr}")]
    CommandFailed {
        /// Exit status code
        status: i32,
        /// Stderr output
        stderr: String,
    },

    /// Command timed out
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// Local file could not be read for upload
    #[error("local file {path}: {message}")]
    LocalFile {
        /// Offending path
        path: String,
        /// Underlying I/O error
        message: String,
    },

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),
}

impl ExecError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecError::ConnectionFailed(_) | ExecError::Channel(_) | ExecError::Timeout { .. }
        )
    }
}
