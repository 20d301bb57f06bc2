//! minefleet-telemetry: Appliance stats API client
//!
//! Speaks the JSON-over-TCP stats protocol exposed by mining appliances and
//! normalizes its heterogeneous responses into the stable snapshot shape.

pub mod client;
pub mod error;
pub mod normalize;
pub mod probe;
pub mod types;

pub use client::{Telemetry, TelemetryClient, commands, decode_frame};
pub use error::TelemetryError;
pub use normalize::{FirmwareKind, classify_version, normalize_stats, round_hashrate};
pub use probe::{PortProbe, TcpProbe};
