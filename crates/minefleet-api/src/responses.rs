//! Response types for the API

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::requests::ControlAction;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Acknowledgement of a control call
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ControlResponse {
    pub ip: String,
    pub action: ControlAction,
    pub result: String,
}

impl ControlResponse {
    #[must_use]
    pub fn success(ip: impl Into<String>, action: ControlAction) -> Self {
        Self {
            ip: ip.into(),
            action,
            result: "success".to_string(),
        }
    }
}

/// Current value of a device flag
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FlagResponse {
    pub ip: String,
    pub value: bool,
}

/// Operator view of one device
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceStatusResponse {
    pub address: String,
    pub state: String,
    pub paused: bool,
    pub light: bool,
    pub operational: bool,
    pub messages: Vec<String>,
}
