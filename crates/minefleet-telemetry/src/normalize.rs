//! Normalization of raw stats responses

use serde_json::Value;
use tracing::debug;

use minefleet_api::snapshot::{
    BoardHashrate, BoardTemps, FanStats, MinerStats, board_key, fan_key,
};

use crate::error::TelemetryError;
use crate::types::{RawStatsResponse, RawVersionResponse};

/// Convert a raw MH/s reading to TH/s rounded to two decimals
///
/// Ties round to the even hundredth.
#[must_use]
pub fn round_hashrate(raw_mhs: f64) -> f64 {
    (raw_mhs / 1_000_000.0 * 100.0).round_ties_even() / 100.0
}

/// Build the normalized stats record from a `devs+temps+fans` response
///
/// Every board listed in `devs` gets a temperature entry; sensors a board
/// does not report read as 0.
///
/// # Errors
/// Returns `TelemetryError::Protocol` if a section is missing or malformed.
pub fn normalize_stats(value: &Value) -> Result<MinerStats, TelemetryError> {
    let raw: RawStatsResponse = serde_json::from_value(value.clone())
        .map_err(|e| TelemetryError::Protocol(format!("stats response: {e}")))?;

    let devs = raw
        .devs
        .first()
        .ok_or_else(|| TelemetryError::Protocol("empty devs section".to_string()))?;
    let temps = raw
        .temps
        .first()
        .ok_or_else(|| TelemetryError::Protocol("empty temps section".to_string()))?;
    let fans = raw
        .fans
        .first()
        .ok_or_else(|| TelemetryError::Protocol("empty fans section".to_string()))?;

    let mut stats = MinerStats::default();

    for board in &devs.devs {
        stats.hashrates.insert(
            board_key(board.id),
            BoardHashrate {
                hr: round_hashrate(board.mhs_5s),
            },
        );
        stats
            .temps
            .insert(board_key(board.id), BoardTemps::default());
    }

    for temp in &temps.temps {
        stats.temps.insert(
            board_key(temp.id),
            BoardTemps {
                board: temp.board.unwrap_or(0.0),
                chip: temp.chip.unwrap_or(0.0),
            },
        );
    }

    for fan in &fans.fans {
        stats.fans.insert(
            fan_key(fan.id),
            FanStats {
                rpm: fan.rpm,
                speed: fan.speed.unwrap_or(0),
            },
        );
    }

    debug!(
        boards = stats.hashrates.len(),
        fans = stats.fans.len(),
        "normalized stats"
    );

    Ok(stats)
}

/// Which firmware family answered a `version` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirmwareKind {
    /// Managed firmware daemon, with the daemon's self-reported version
    Managed { daemon: String },
    /// Stock vendor firmware
    Legacy { daemon: String },
    /// Anything else, including unparseable responses
    Unknown,
}

/// Classify a `version` response by the daemon key it carries
#[must_use]
pub fn classify_version(value: &Value) -> FirmwareKind {
    let Ok(raw) = serde_json::from_value::<RawVersionResponse>(value.clone()) else {
        return FirmwareKind::Unknown;
    };
    let Some(entry) = raw.version.first() else {
        return FirmwareKind::Unknown;
    };

    let daemon_version = |key: &str| {
        entry
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    if let Some(key) = entry.keys().find(|k| k.starts_with("BOSminer")) {
        return FirmwareKind::Managed {
            daemon: daemon_version(key),
        };
    }
    if let Some(key) = entry
        .keys()
        .find(|k| matches!(k.as_str(), "CGMiner" | "BMMiner"))
    {
        return FirmwareKind::Legacy {
            daemon: daemon_version(key),
        };
    }

    FirmwareKind::Unknown
}
