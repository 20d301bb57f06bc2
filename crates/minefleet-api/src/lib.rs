//! minefleet-api: Shared API types and schemas
//!
//! Contains the fleet snapshot shape, control request/response types and the
//! broadcast event types consumed by whatever transport sits in front of the
//! fleet.

pub mod events;
pub mod requests;
pub mod responses;
pub mod snapshot;

pub use events::FleetEvent;
pub use requests::{ControlAction, DeviceFlag};
pub use responses::{ControlResponse, DeviceStatusResponse, FlagResponse, HealthResponse};
pub use snapshot::{
    BoardHashrate, BoardTemps, FanStats, FleetSnapshot, MinerStats, SnapshotPayload, StatsSnapshot,
};
