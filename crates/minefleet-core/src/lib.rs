//! minefleet-core: Device lifecycle and fleet orchestration
//!
//! Implements the per-device `DeviceController` state machine, the
//! provisioning pipeline it drives, the `FleetRegistry` that fans polls and
//! control calls out across devices, and the `FleetActor` (kameo) that puts
//! the registry behind a mailbox for the transport layer.

pub mod actor;
pub mod config;
pub mod deps;
pub mod device;
pub mod error;
pub mod gate;
pub mod message;
pub mod message_log;
pub mod poller;
pub mod provision;
pub mod registry;
pub mod state;

pub use actor::fleet::{FleetActor, FleetActorArgs};
pub use config::{
    ArtifactPaths, Credentials, FleetSettings, InstallParams, InstallStrategy, LifecycleTimings,
    MinerConfig, Ports, ProvisioningConfig, TimingsConfig, UnlockConfig, VendorInstaller,
};
pub use deps::{DeviceDeps, DeviceFactory};
pub use device::{DeviceController, spawn_lifecycle};
pub use error::{CoreError, ProvisionError, UnlockError};
pub use gate::PauseGate;
pub use message::{
    BasicSnapshot, CheckLight, CheckPause, DeviceStatus, LightDevice, ListDevices, PauseDevice,
    PollFleet, RegisterDevice, StartLifecycles, UnlightDevice, UnpauseDevice,
};
pub use message_log::MessageLog;
pub use poller::{PollLoop, RunFlag};
pub use provision::{ProvisioningPipeline, generate_hwid};
pub use registry::FleetRegistry;
pub use state::{LifecycleEvent, LifecycleState, VersionStatus};
