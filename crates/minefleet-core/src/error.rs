//! Core error types for minefleet-core

use std::path::PathBuf;

use thiserror::Error;

use crate::state::{LifecycleEvent, LifecycleState};

/// Errors that can occur in core fleet operations
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Control call referenced an unregistered device
    #[error("address not found: {0}")]
    AddressNotFound(String),

    /// Device already exists in registry
    #[error("address already registered: {0}")]
    AddressAlreadyRegistered(String),

    /// Lifecycle event not accepted in the current state
    #[error("invalid transition from {from} on {event:?}")]
    InvalidTransition {
        /// Current state
        from: LifecycleState,
        /// Rejected event
        event: LifecycleEvent,
    },
}

/// Failures that abort a provisioning run
///
/// Remote command failures are not in here: those are retried, logged and
/// skipped over.
#[derive(Error, Debug, Clone)]
pub enum ProvisionError {
    /// A deployment artifact is missing on the controlling host
    #[error("missing artifact: {}", path.display())]
    MissingArtifact {
        /// Expected location
        path: PathBuf,
    },

    /// External installer could not be run
    #[error("installer failed to run: {0}")]
    Installer(String),

    /// External installer ran and reported failure
    #[error("installer exited with status {status}: {output}")]
    InstallerFailed {
        /// Exit status
        status: i32,
        /// Captured output
        output: String,
    },
}

/// Vendor unlock failures
#[derive(Error, Debug, Clone)]
pub enum UnlockError {
    /// Tool output asked for a physical reset of the device
    #[error("manual reset required")]
    ManualResetRequired,

    /// Tool could not be run
    #[error("unlock tool failed to run: {0}")]
    Tool(String),

    /// Tool ran and reported failure
    #[error("unlock tool exited with status {0}")]
    Failed(i32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::AddressNotFound("10.0.0.9".to_string());
        assert_eq!(err.to_string(), "address not found: 10.0.0.9");

        let err = CoreError::InvalidTransition {
            from: LifecycleState::Done,
            event: LifecycleEvent::Unlocked,
        };
        assert_eq!(err.to_string(), "invalid transition from done on Unlocked");

        assert_eq!(
            UnlockError::ManualResetRequired.to_string(),
            "manual reset required"
        );
        let err = ProvisionError::MissingArtifact {
            path: PathBuf::from("/srv/firmware"),
        };
        assert_eq!(err.to_string(), "missing artifact: /srv/firmware");
    }
}
