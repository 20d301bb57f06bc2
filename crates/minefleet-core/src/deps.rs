//! Network collaborators of a device controller

use std::sync::Arc;

use async_trait::async_trait;

use minefleet_exec::{RemoteShell, ToolRunner};
use minefleet_telemetry::{PortProbe, Telemetry};

use crate::config::{FleetSettings, MinerConfig};

/// Everything a `DeviceController` talks to
#[derive(Clone)]
pub struct DeviceDeps {
    /// Stats API client
    pub telemetry: Arc<dyn Telemetry>,
    /// Remote shell bound to this device
    pub shell: Arc<dyn RemoteShell>,
    /// Port reachability
    pub probe: Arc<dyn PortProbe>,
    /// Vendor tools on the controlling host
    pub tools: Arc<dyn ToolRunner>,
}

/// Factory trait for creating device dependencies
///
/// Allows injection of mock backends in tests.
#[async_trait]
pub trait DeviceFactory: Send + Sync {
    /// Create the collaborators for the given device
    async fn create_deps(&self, config: &MinerConfig, settings: &FleetSettings) -> DeviceDeps;
}
