//! Normalized per-device telemetry and the fleet-wide snapshot

use std::collections::BTreeMap;

use chrono::Local;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Board ids reported by a stock three-chain appliance
pub const DEFAULT_BOARD_IDS: [u32; 3] = [6, 7, 8];

/// Fan ids reported by a stock appliance
pub const DEFAULT_FAN_IDS: [u32; 2] = [0, 1];

/// Map key for a fan entry (`fan_<id>`)
#[must_use]
pub fn fan_key(id: u32) -> String {
    format!("fan_{id}")
}

/// Map key for a board entry (`board_<id>`)
#[must_use]
pub fn board_key(id: u32) -> String {
    format!("board_{id}")
}

/// Wall-clock stamp in the `HH:MM:SS.ffffff` shape the dashboard expects
#[must_use]
pub fn timestamp() -> String {
    Local::now().format("%H:%M:%S%.6f").to_string()
}

/// Fan reading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct FanStats {
    #[serde(rename = "RPM")]
    pub rpm: u32,
    /// Fan duty in percent
    #[serde(rename = "Speed", default)]
    pub speed: u32,
}

/// Board hashrate in TH/s, rounded to two decimals
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct BoardHashrate {
    #[serde(rename = "HR")]
    pub hr: f64,
}

/// Board and chip temperature in degrees Celsius
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct BoardTemps {
    #[serde(rename = "Board")]
    pub board: f64,
    #[serde(rename = "Chip")]
    pub chip: f64,
}

/// Telemetry of a device running managed firmware
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct MinerStats {
    #[serde(rename = "Fans")]
    pub fans: BTreeMap<String, FanStats>,
    #[serde(rename = "HR")]
    pub hashrates: BTreeMap<String, BoardHashrate>,
    #[serde(rename = "Temps")]
    pub temps: BTreeMap<String, BoardTemps>,
}

impl MinerStats {
    /// All-zero readings for the default board and fan layout
    #[must_use]
    pub fn zeroed() -> Self {
        let mut stats = Self::default();
        for id in DEFAULT_FAN_IDS {
            stats.fans.insert(fan_key(id), FanStats::default());
        }
        for id in DEFAULT_BOARD_IDS {
            stats.hashrates.insert(board_key(id), BoardHashrate::default());
            stats.temps.insert(board_key(id), BoardTemps::default());
        }
        stats
    }

    /// Look up a board's hashrate by numeric id
    #[must_use]
    pub fn hashrate(&self, board_id: u32) -> Option<f64> {
        self.hashrates.get(&board_key(board_id)).map(|h| h.hr)
    }

    /// Look up a board's temperatures by numeric id
    #[must_use]
    pub fn temps(&self, board_id: u32) -> Option<BoardTemps> {
        self.temps.get(&board_key(board_id)).copied()
    }

    /// Look up a fan's reading by numeric id
    #[must_use]
    pub fn fan(&self, fan_id: u32) -> Option<FanStats> {
        self.fans.get(&fan_key(fan_id)).copied()
    }
}

/// Snapshot body: either live telemetry or the device's message log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum SnapshotPayload {
    /// Usable telemetry from managed firmware
    Telemetry(MinerStats),
    /// Fallback while telemetry is unavailable, most recent line first
    Messages {
        text: Vec<String>,
    },
}

/// Normalized telemetry for one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatsSnapshot {
    /// Device network address
    #[serde(rename = "IP")]
    pub address: String,
    /// Fault-indicator display hint (operator intent)
    #[serde(rename = "Light")]
    pub light: bool,
    /// When the snapshot was taken
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(flatten)]
    pub payload: SnapshotPayload,
}

impl StatsSnapshot {
    /// Snapshot carrying live telemetry
    pub fn telemetry(address: impl Into<String>, light: bool, stats: MinerStats) -> Self {
        Self {
            address: address.into(),
            light,
            time: timestamp(),
            payload: SnapshotPayload::Telemetry(stats),
        }
    }

    /// Snapshot carrying the device's message log
    pub fn messages(address: impl Into<String>, light: bool, text: Vec<String>) -> Self {
        Self {
            address: address.into(),
            light,
            time: timestamp(),
            payload: SnapshotPayload::Messages { text },
        }
    }

    /// Zero-valued placeholder shown before the first poll completes
    pub fn placeholder(address: impl Into<String>) -> Self {
        Self::telemetry(address, false, MinerStats::zeroed())
    }

    /// Telemetry if present
    #[must_use]
    pub fn stats(&self) -> Option<&MinerStats> {
        match &self.payload {
            SnapshotPayload::Telemetry(stats) => Some(stats),
            SnapshotPayload::Messages { .. } => None,
        }
    }

    /// Whether this snapshot is the message-log fallback
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self.payload, SnapshotPayload::Messages { .. })
    }
}

/// One snapshot per registered device, in registration order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct FleetSnapshot {
    pub miners: Vec<StatsSnapshot>,
}

impl FleetSnapshot {
    #[must_use]
    pub fn new(miners: Vec<StatsSnapshot>) -> Self {
        Self { miners }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.miners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.miners.is_empty()
    }

    /// Device addresses in snapshot order
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.miners.iter().map(|m| m.address.as_str())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_telemetry_snapshot_shape() {
        let mut stats = MinerStats::default();
        stats.fans.insert(fan_key(0), FanStats { rpm: 1440, speed: 40 });
        stats
            .hashrates
            .insert(board_key(6), BoardHashrate { hr: 1.13 });
        stats.temps.insert(
            board_key(6),
            BoardTemps {
                board: 83.1875,
                chip: 88.875,
            },
        );

        let mut snapshot = StatsSnapshot::telemetry("10.0.0.5", true, stats);
        snapshot.time = "12:00:00.000000".to_string();

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            value,
            json!({
                "IP": "10.0.0.5",
                "Light": true,
                "Time": "12:00:00.000000",
                "Fans": {"fan_0": {"RPM": 1440, "Speed": 40}},
                "HR": {"board_6": {"HR": 1.13}},
                "Temps": {"board_6": {"Board": 83.1875, "Chip": 88.875}},
            })
        );
    }

    #[test]
    fn test_fallback_snapshot_shape() {
        let mut snapshot =
            StatsSnapshot::messages("10.0.0.6", false, vec!["Down...".to_string()]);
        snapshot.time = "12:00:00.000000".to_string();

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["text"], json!(["Down..."]));
        assert!(value.get("HR").is_none());
        assert!(snapshot.is_fallback());
    }

    #[test]
    fn test_fallback_snapshot_deserializes_as_messages() {
        let value = json!({
            "IP": "10.0.0.6",
            "Light": false,
            "Time": "12:00:00.000000",
            "text": ["Installing...", "Down..."],
        });

        let snapshot: StatsSnapshot = serde_json::from_value(value).unwrap();
        assert!(snapshot.stats().is_none());
        assert_eq!(
            snapshot.payload,
            SnapshotPayload::Messages {
                text: vec!["Installing...".to_string(), "Down...".to_string()]
            }
        );
    }

    #[test]
    fn test_placeholder_is_zeroed() {
        let snapshot = StatsSnapshot::placeholder("10.0.0.7");
        let stats = snapshot.stats().unwrap();

        assert_eq!(stats.fans.len(), DEFAULT_FAN_IDS.len());
        for id in DEFAULT_BOARD_IDS {
            assert_eq!(stats.hashrate(id), Some(0.0));
            assert_eq!(stats.temps(id), Some(BoardTemps::default()));
        }
        assert!(!snapshot.light);
    }
}
