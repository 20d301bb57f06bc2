//! Raw stats API response shapes
//!
//! A combined command such as `devs+temps+fans` answers with one top-level
//! key per sub-command, each holding a one-element array that wraps the
//! sub-command's own response.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Response to `devs+temps+fans`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawStatsResponse {
    pub devs: Vec<DevsSection>,
    pub temps: Vec<TempsSection>,
    pub fans: Vec<FansSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevsSection {
    #[serde(rename = "DEVS", default)]
    pub devs: Vec<RawBoard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempsSection {
    #[serde(rename = "TEMPS", default)]
    pub temps: Vec<RawTemp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FansSection {
    #[serde(rename = "FANS", default)]
    pub fans: Vec<RawFan>,
}

/// One hashboard from the `devs` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBoard {
    #[serde(rename = "ID")]
    pub id: u32,
    /// Five-second average in MH/s
    #[serde(rename = "MHS 5s", default)]
    pub mhs_5s: f64,
}

/// One board's sensors from the `temps` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTemp {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(rename = "Board", default)]
    pub board: Option<f64>,
    #[serde(rename = "Chip", default)]
    pub chip: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFan {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(rename = "RPM", default)]
    pub rpm: u32,
    #[serde(rename = "Speed", default)]
    pub speed: Option<u32>,
}

/// Response to `version`
///
/// The single entry names the running daemon as a key (`BOSminer`,
/// `CGMiner`, ...), so it is kept as a loose map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawVersionResponse {
    #[serde(rename = "VERSION", default)]
    pub version: Vec<Map<String, Value>>,
}
