//! Message types for actor communication
//!
//! Message handlers are implemented in `actor::fleet`.

use kameo_macros::Reply;

use minefleet_api::DeviceStatusResponse;

use crate::config::MinerConfig;
use crate::state::LifecycleState;

/// Register a new device with the fleet
#[derive(Debug)]
pub struct RegisterDevice {
    /// Device configuration
    pub config: MinerConfig,
}

/// Poll every device and collect a fleet snapshot
#[derive(Debug)]
pub struct PollFleet;

/// Zero-valued snapshot for display before the first poll
#[derive(Debug)]
pub struct BasicSnapshot;

/// Start one lifecycle task per registered device
#[derive(Debug)]
pub struct StartLifecycles;

/// Block a device's lifecycle at its next checkpoint
#[derive(Debug)]
pub struct PauseDevice {
    pub address: String,
}

/// Release a paused device
#[derive(Debug)]
pub struct UnpauseDevice {
    pub address: String,
}

/// Whether a device is paused
#[derive(Debug)]
pub struct CheckPause {
    pub address: String,
}

/// Turn a device's fault indicator on
#[derive(Debug)]
pub struct LightDevice {
    pub address: String,
}

/// Turn a device's fault indicator off
#[derive(Debug)]
pub struct UnlightDevice {
    pub address: String,
}

/// Whether a device's fault indicator is on
#[derive(Debug)]
pub struct CheckLight {
    pub address: String,
}

/// List all managed devices
#[derive(Debug)]
pub struct ListDevices;

/// Device status response
#[derive(Debug, Clone, Reply)]
pub struct DeviceStatus {
    /// Device address
    pub address: String,
    /// Current lifecycle state
    pub state: LifecycleState,
    /// Whether the pause gate is cleared
    pub paused: bool,
    /// Fault-indicator flag
    pub light: bool,
    /// Whether usable telemetry is available
    pub operational: bool,
    /// Message log, most recent first
    pub messages: Vec<String>,
}

impl From<DeviceStatus> for DeviceStatusResponse {
    fn from(status: DeviceStatus) -> Self {
        Self {
            address: status.address,
            state: status.state.to_string(),
            paused: status.paused,
            light: status.light,
            operational: status.operational,
            messages: status.messages,
        }
    }
}
