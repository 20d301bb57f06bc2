//! Request types for the API

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Operator control issued against a single device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Pause,
    Unpause,
    Light,
    Unlight,
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlAction::Pause => "pause",
            ControlAction::Unpause => "unpause",
            ControlAction::Light => "light",
            ControlAction::Unlight => "unlight",
        };
        f.write_str(name)
    }
}

/// Flag that can be read back from a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFlag {
    Pause,
    Light,
}
