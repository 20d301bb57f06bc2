//! API route handlers

pub mod devices;
pub mod error;
pub mod fleet;
pub mod system;

use utoipa::OpenApi;

use minefleet_api::{
    BoardHashrate, BoardTemps, ControlAction, ControlResponse, DeviceFlag, DeviceStatusResponse,
    FanStats, FlagResponse, FleetSnapshot, HealthResponse, MinerStats, SnapshotPayload,
    StatsSnapshot,
};

pub use error::ApiError;

#[derive(OpenApi)]
#[openapi(
    info(title = "minefleet", description = "Mining appliance fleet manager"),
    paths(
        system::health,
        fleet::snapshot,
        devices::list_devices,
        devices::control,
        devices::check_flag,
    ),
    components(schemas(
        ApiError,
        HealthResponse,
        FleetSnapshot,
        StatsSnapshot,
        SnapshotPayload,
        MinerStats,
        FanStats,
        BoardHashrate,
        BoardTemps,
        DeviceStatusResponse,
        ControlAction,
        ControlResponse,
        DeviceFlag,
        FlagResponse,
    ))
)]
pub struct ApiDoc;
