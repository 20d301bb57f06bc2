//! Device lifecycle state machine types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle states of a `DeviceController`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Probing liveness and deciding what the device needs
    Start,
    /// Installing managed firmware
    Install,
    /// Upgrading an older managed firmware
    Update,
    /// Pushing the referral package and mining configuration
    Referral,
    /// Provisioned; waiting for the device to drop off
    Done,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Start => "start",
            LifecycleState::Install => "install",
            LifecycleState::Update => "update",
            LifecycleState::Referral => "referral",
            LifecycleState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of a firmware version query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionStatus {
    /// Stats API did not answer in time
    Timeout,
    /// No managed firmware detected
    Unknown,
    /// Stock vendor firmware
    LegacyAppliance,
    /// Managed firmware older than the newest release
    ManagedOld,
    /// Managed firmware at the newest release
    ManagedCurrent,
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            VersionStatus::Timeout => "no answer",
            VersionStatus::Unknown => "unknown",
            VersionStatus::LegacyAppliance => "stock",
            VersionStatus::ManagedOld => "outdated",
            VersionStatus::ManagedCurrent => "current",
        };
        f.write_str(text)
    }
}

/// Result of one lifecycle step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// Liveness port closed
    LivenessDown,
    /// Shell reachable, version query answered
    Version(VersionStatus),
    /// Shell was closed and the unlock tool opened it
    Unlocked,
    /// Unlock failed and the device has since disconnected
    UnlockFailed,
    Installed,
    InstallFailed,
    Updated,
    Configured,
    /// Provisioned device dropped off
    Disconnected,
}

impl LifecycleState {
    /// Apply `event` to this state
    ///
    /// # Errors
    /// Returns `CoreError::InvalidTransition` if the event cannot occur in
    /// this state.
    pub fn next(self, event: LifecycleEvent) -> Result<LifecycleState, CoreError> {
        use LifecycleEvent as E;
        use LifecycleState as S;

        let next = match (self, event) {
            (S::Start, E::LivenessDown | E::UnlockFailed) => S::Start,
            (S::Start, E::Version(status)) => match status {
                VersionStatus::ManagedCurrent => S::Referral,
                VersionStatus::ManagedOld => S::Update,
                VersionStatus::Unknown | VersionStatus::LegacyAppliance => S::Install,
                VersionStatus::Timeout => S::Start,
            },
            (S::Start, E::Unlocked) => S::Install,
            (S::Install, E::Installed) => S::Referral,
            (S::Install, E::InstallFailed) => S::Start,
            (S::Update, E::Updated) => S::Referral,
            (S::Referral, E::Configured) => S::Done,
            (S::Done, E::Disconnected) => S::Start,
            (from, event) => return Err(CoreError::InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use LifecycleEvent as E;
    use LifecycleState as S;

    fn walk(events: &[LifecycleEvent]) -> Vec<LifecycleState> {
        let mut state = S::Start;
        let mut visited = vec![state];
        for event in events {
            state = state.next(*event).unwrap();
            visited.push(state);
        }
        visited
    }

    #[test]
    fn test_current_firmware_skips_install_and_update() {
        let visited = walk(&[
            E::Version(VersionStatus::ManagedCurrent),
            E::Configured,
            E::Disconnected,
        ]);

        assert_eq!(visited, vec![S::Start, S::Referral, S::Done, S::Start]);
    }

    #[test]
    fn test_outdated_firmware_updates() {
        let visited = walk(&[
            E::Version(VersionStatus::ManagedOld),
            E::Updated,
            E::Configured,
        ]);

        assert_eq!(visited, vec![S::Start, S::Update, S::Referral, S::Done]);
    }

    #[test]
    fn test_unmanaged_firmware_installs() {
        for status in [VersionStatus::Unknown, VersionStatus::LegacyAppliance] {
            assert_eq!(S::Start.next(E::Version(status)).unwrap(), S::Install);
        }
        assert_eq!(S::Start.next(E::Unlocked).unwrap(), S::Install);
    }

    #[test]
    fn test_start_self_loops() {
        assert_eq!(S::Start.next(E::LivenessDown).unwrap(), S::Start);
        assert_eq!(S::Start.next(E::UnlockFailed).unwrap(), S::Start);
        assert_eq!(
            S::Start.next(E::Version(VersionStatus::Timeout)).unwrap(),
            S::Start
        );
    }

    #[test]
    fn test_failed_install_restarts() {
        assert_eq!(S::Install.next(E::InstallFailed).unwrap(), S::Start);
        assert_eq!(S::Install.next(E::Installed).unwrap(), S::Referral);
    }

    #[test]
    fn test_rejected_events() {
        let err = S::Done.next(E::Installed).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                from: S::Done,
                event: E::Installed
            }
        ));

        assert!(S::Update.next(E::LivenessDown).is_err());
        assert!(S::Referral.next(E::Version(VersionStatus::ManagedCurrent)).is_err());
        assert!(S::Start.next(E::Configured).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(S::Referral.to_string(), "referral");
        assert_eq!(VersionStatus::ManagedOld.to_string(), "outdated");
    }
}
