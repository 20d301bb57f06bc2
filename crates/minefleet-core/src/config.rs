//! Configuration types for devices and fleet operations

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;

/// Configuration for a single managed device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerConfig {
    /// Network address, the device's unique key
    pub address: String,
}

impl MinerConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// Well-known device ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ports {
    /// Stats API
    pub telemetry: u16,
    /// Web UI, used as the liveness signal
    pub liveness: u16,
    /// Remote shell
    pub shell: u16,
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            telemetry: 4028,
            liveness: 80,
            shell: 22,
        }
    }
}

/// Appliance login
///
/// These are the factory defaults the appliances ship with; host keys are
/// not verified either. Only suitable for a trusted private network.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            password: "admin".to_string(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Deployment artifacts on the controlling host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactPaths {
    /// Directory holding the compatibility binaries
    pub system_dir: PathBuf,
    /// Unpacked firmware bundle
    pub firmware_dir: PathBuf,
    /// Upgrade bundle for devices running an older managed firmware
    pub update_bundle: PathBuf,
    /// Referral package
    pub referral_package: PathBuf,
    /// Mining daemon configuration pushed with the referral package
    pub referral_config: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        let root = PathBuf::from("files");
        Self {
            system_dir: root.join("system"),
            firmware_dir: root.join("firmware"),
            update_bundle: root.join("update.tar"),
            referral_package: root.join("referral.ipk"),
            referral_config: root.join("bosminer.toml"),
        }
    }
}

impl ArtifactPaths {
    /// Fail with `MissingArtifact` unless `path` exists
    ///
    /// # Errors
    /// Returns `ProvisionError::MissingArtifact` naming the missing path.
    pub fn require(path: &Path) -> Result<&Path, ProvisionError> {
        if path.exists() {
            Ok(path)
        } else {
            Err(ProvisionError::MissingArtifact {
                path: path.to_path_buf(),
            })
        }
    }
}

/// Fixed parameters handed to the bundle's install script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallParams {
    /// Pool user configured on first boot
    pub pool_user: String,
    /// PSU power limit in watts, 0 keeps the firmware default
    pub psu_power_limit: u32,
    /// Keep the device's network settings
    pub keep_network: bool,
    /// Keep the device's hostname
    pub keep_hostname: bool,
}

impl Default for InstallParams {
    fn default() -> Self {
        Self {
            pool_user: String::new(),
            psu_power_limit: 0,
            keep_network: true,
            keep_hostname: true,
        }
    }
}

impl InstallParams {
    /// Script arguments following the hardware id
    #[must_use]
    pub fn script_args(&self) -> Vec<String> {
        let flag = |on: bool| if on { "yes" } else { "no" }.to_string();
        vec![
            self.pool_user.clone(),
            self.psu_power_limit.to_string(),
            flag(self.keep_network),
            flag(self.keep_hostname),
        ]
    }
}

/// External installer run on the controlling host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorInstaller {
    pub program: String,
    /// Argument template; `{address}` is replaced with the device address
    #[serde(default)]
    pub args: Vec<String>,
}

impl VendorInstaller {
    /// Arguments for one device
    #[must_use]
    pub fn args_for(&self, address: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace("{address}", address))
            .collect()
    }
}

/// How firmware gets onto a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum InstallStrategy {
    /// Multi-step install over the remote shell
    Scripted(InstallParams),
    /// Hand the device to a vendor installer
    Vendor(VendorInstaller),
}

impl Default for InstallStrategy {
    fn default() -> Self {
        Self::Scripted(InstallParams::default())
    }
}

/// Vendor unlock tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnlockConfig {
    pub program: String,
    /// Username passed after the device address
    pub user: String,
    /// Output substring meaning the device needs a physical reset
    pub manual_reset_marker: String,
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self {
            program: "unlock".to_string(),
            user: "root".to_string(),
            manual_reset_marker: "manual reset".to_string(),
        }
    }
}

/// Firmware targets and the tools used to reach them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// Newest managed firmware release
    pub newest_version: String,
    /// Remote file holding the installed release
    pub version_marker_path: String,
    pub install: InstallStrategy,
    pub unlock: UnlockConfig,
    /// Message log capacity per device
    pub message_log_capacity: usize,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            newest_version: String::new(),
            version_marker_path: "/etc/bos_version".to_string(),
            install: InstallStrategy::default(),
            unlock: UnlockConfig::default(),
            message_log_capacity: 100,
        }
    }
}

/// Fixed waits, in seconds as written in the config file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingsConfig {
    pub tick_secs: f64,
    pub settle_secs: f64,
    pub update_settle_secs: f64,
    pub install_progress_secs: f64,
    pub install_grace_secs: f64,
    pub liveness_poll_secs: f64,
    pub version_retry_secs: f64,
    pub version_timeout_secs: f64,
}

impl Default for TimingsConfig {
    fn default() -> Self {
        Self {
            tick_secs: 3.0,
            settle_secs: 5.0,
            update_settle_secs: 20.0,
            install_progress_secs: 20.0,
            install_grace_secs: 30.0,
            liveness_poll_secs: 1.0,
            version_retry_secs: 1.0,
            version_timeout_secs: 5.0,
        }
    }
}

impl From<TimingsConfig> for LifecycleTimings {
    fn from(cfg: TimingsConfig) -> Self {
        let secs = |s: f64| Duration::try_from_secs_f64(s).unwrap_or_default();
        Self {
            tick: secs(cfg.tick_secs),
            settle: secs(cfg.settle_secs),
            update_settle: secs(cfg.update_settle_secs),
            install_progress: secs(cfg.install_progress_secs),
            install_grace: secs(cfg.install_grace_secs),
            liveness_poll: secs(cfg.liveness_poll_secs),
            version_retry: secs(cfg.version_retry_secs),
            version_timeout: secs(cfg.version_timeout_secs),
        }
    }
}

/// Fixed waits used by the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTimings {
    /// Lifecycle wake interval
    pub tick: Duration,
    /// Pause after unlocking and before install or referral
    pub settle: Duration,
    /// Wait after starting a firmware upgrade
    pub update_settle: Duration,
    /// One of the four install progress intervals
    pub install_progress: Duration,
    /// Sleep after the device returns from install
    pub install_grace: Duration,
    /// Liveness poll period while waiting for a disconnect or return
    pub liveness_poll: Duration,
    /// Delay between refused version queries
    pub version_retry: Duration,
    /// Bound on a version query
    pub version_timeout: Duration,
}

impl Default for LifecycleTimings {
    fn default() -> Self {
        TimingsConfig::default().into()
    }
}

/// Everything a device controller needs besides its own address
#[derive(Debug, Clone, Default)]
pub struct FleetSettings {
    pub ports: Ports,
    pub credentials: Credentials,
    pub artifacts: ArtifactPaths,
    pub provisioning: ProvisioningConfig,
    pub timings: LifecycleTimings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timings_defaults() {
        let timings = LifecycleTimings::default();

        assert_eq!(timings.tick, Duration::from_secs(3));
        assert_eq!(timings.settle, Duration::from_secs(5));
        assert_eq!(timings.update_settle, Duration::from_secs(20));
        assert_eq!(timings.install_progress, Duration::from_secs(20));
        assert_eq!(timings.liveness_poll, Duration::from_secs(1));
    }

    #[test]
    fn test_negative_timing_reads_as_zero() {
        let timings: LifecycleTimings = TimingsConfig {
            settle_secs: -1.0,
            ..TimingsConfig::default()
        }
        .into();

        assert_eq!(timings.settle, Duration::ZERO);
    }

    #[test]
    fn test_vendor_args_template() {
        let installer = VendorInstaller {
            program: "bos-toolbox".to_string(),
            args: vec![
                "install".to_string(),
                "--host={address}".to_string(),
                "--no-keep-pools".to_string(),
            ],
        };

        assert_eq!(
            installer.args_for("10.0.0.7"),
            vec!["install", "--host=10.0.0.7", "--no-keep-pools"]
        );
    }

    #[test]
    fn test_install_params_args() {
        let params = InstallParams {
            pool_user: "farm.worker".to_string(),
            psu_power_limit: 1200,
            keep_network: true,
            keep_hostname: false,
        };

        assert_eq!(params.script_args(), vec!["farm.worker", "1200", "yes", "no"]);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let rendered = format!("{:?}", Credentials::default());

        assert!(rendered.contains("root"));
        assert!(!rendered.contains("admin"));
    }

    #[test]
    fn test_require_missing_artifact() {
        let err = ArtifactPaths::require(Path::new("/nonexistent/firmware")).unwrap_err();
        assert!(matches!(err, ProvisionError::MissingArtifact { .. }));
    }
}
