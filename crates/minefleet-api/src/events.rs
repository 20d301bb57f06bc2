//! Fleet broadcast event types

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::snapshot::FleetSnapshot;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type")]
pub enum FleetEvent {
    DeviceStateChanged {
        address: String,
        from: String,
        to: String,
    },
    DeviceMessage {
        address: String,
        message: String,
    },
    DevicePaused {
        address: String,
        paused: bool,
    },
    DeviceLight {
        address: String,
        light: bool,
    },
    Snapshot {
        snapshot: FleetSnapshot,
    },
}

impl FleetEvent {
    /// Address of the device the event concerns, if any
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        match self {
            FleetEvent::DeviceStateChanged { address, .. }
            | FleetEvent::DeviceMessage { address, .. }
            | FleetEvent::DevicePaused { address, .. }
            | FleetEvent::DeviceLight { address, .. } => Some(address),
            FleetEvent::Snapshot { .. } => None,
        }
    }
}
