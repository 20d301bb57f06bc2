//! Configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::WrapErr;
use serde::{Deserialize, Serialize};

use minefleet_core::{
    ArtifactPaths, Credentials, FleetSettings, MinerConfig, Ports, ProvisioningConfig,
    TimingsConfig,
};

/// Top-level configuration for the minefleet daemon
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Daemon server settings
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub ports: Ports,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub artifacts: ArtifactPaths,
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
    #[serde(default)]
    pub timings: TimingsConfig,
    /// Devices in registration order
    #[serde(default)]
    pub miner: Vec<MinerConfig>,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Daemon server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Address and port to bind to
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Seconds between fleet polls
    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: u64,
    /// Per-device bound inside a poll, in seconds
    #[serde(default = "default_poll_secs")]
    pub poll_timeout_secs: u64,
    /// Event broadcast channel capacity
    #[serde(default = "default_event_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            poll_interval_secs: default_poll_secs(),
            poll_timeout_secs: default_poll_secs(),
            event_channel_capacity: default_event_capacity(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_secs() -> u64 {
    5
}

fn default_event_capacity() -> usize {
    1024
}

impl DaemonConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load from an explicit path, the environment or the default paths
    ///
    /// Returns the file the configuration came from, or `None` when no file
    /// was found and defaults are used.
    ///
    /// # Errors
    /// Returns error if a file is found but cannot be read or parsed
    pub fn resolve(explicit: Option<&Path>) -> eyre::Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        if let Ok(path) = std::env::var("MINEFLEET_CONFIG") {
            let path = PathBuf::from(path);
            return Ok((Self::load(&path)?, Some(path)));
        }

        let mut paths = vec![
            PathBuf::from("minefleet.toml"),
            PathBuf::from("/etc/minefleet/minefleet.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("minefleet/minefleet.toml"));
        }

        for path in paths {
            if path.exists() {
                return Ok((Self::load(&path)?, Some(path)));
            }
        }

        Ok((Config::default(), None))
    }

    /// Settings shared by every device controller
    #[must_use]
    pub fn fleet_settings(&self) -> FleetSettings {
        FleetSettings {
            ports: self.ports,
            credentials: self.credentials.clone(),
            artifacts: self.artifacts.clone(),
            provisioning: self.provisioning.clone(),
            timings: self.timings.into(),
        }
    }
}
