//! Device factory wiring the real network backends

use std::sync::Arc;

use async_trait::async_trait;

use minefleet_core::{DeviceDeps, DeviceFactory, FleetSettings, MinerConfig};
use minefleet_exec::{ConnectionInfo, LocalRunner, SshShell};
use minefleet_telemetry::{TcpProbe, TelemetryClient};

/// Default implementation of `DeviceFactory`
///
/// The probe and the local tool runner hold no per-device state and are
/// shared by every device.
pub struct DefaultDeviceFactory {
    probe: Arc<TcpProbe>,
    tools: Arc<LocalRunner>,
}

impl DefaultDeviceFactory {
    /// Create a new factory instance
    pub fn new() -> Self {
        Self {
            probe: Arc::new(TcpProbe::default()),
            tools: Arc::new(LocalRunner::new()),
        }
    }
}

impl Default for DefaultDeviceFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceFactory for DefaultDeviceFactory {
    async fn create_deps(&self, config: &MinerConfig, settings: &FleetSettings) -> DeviceDeps {
        let credentials = &settings.credentials;
        let conn_info =
            ConnectionInfo::new(&config.address, &credentials.user, &credentials.password)
                .with_port(settings.ports.shell);

        let telemetry = TelemetryClient::new()
            .with_port(settings.ports.telemetry)
            .with_timeout(settings.timings.version_timeout);

        DeviceDeps {
            telemetry: Arc::new(telemetry),
            shell: Arc::new(SshShell::new(conn_info)),
            probe: self.probe.clone(),
            tools: self.tools.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use minefleet_exec::RemoteShell;

    use super::*;

    #[tokio::test]
    async fn test_creates_shell_for_device() {
        let mut settings = FleetSettings::default();
        settings.ports.shell = 2222;

        let deps = DefaultDeviceFactory::new()
            .create_deps(&MinerConfig::new("10.0.0.21"), &settings)
            .await;

        assert_eq!(deps.shell.address(), "10.0.0.21");
    }
}
