//! Per-device control endpoints

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};

use minefleet_api::{ControlAction, ControlResponse, DeviceFlag, DeviceStatusResponse, FlagResponse};
use minefleet_core::{
    CheckLight, CheckPause, LightDevice, ListDevices, PauseDevice, UnlightDevice, UnpauseDevice,
};

use crate::api::error::{ApiError, AppError};
use crate::state::AppState;

/// List every registered device with its lifecycle state
///
/// # Errors
/// Returns `AppError` if the fleet actor is unavailable
#[utoipa::path(
    get,
    path = "/devices",
    tag = "devices",
    responses(
        (status = 200, description = "Devices in registration order", body = [DeviceStatusResponse]),
        (status = 500, description = "Fleet unavailable", body = ApiError)
    )
)]
pub async fn list_devices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DeviceStatusResponse>>, AppError> {
    let devices = state
        .fleet
        .ask(ListDevices)
        .await
        .map_err(|e| AppError::internal(format!("failed to list devices: {e}")))?;

    Ok(Json(devices.into_iter().map(Into::into).collect()))
}

/// Pause, unpause, light or unlight a device
///
/// # Errors
/// Returns `AppError` with 404 if the address is not registered
#[utoipa::path(
    post,
    path = "/devices/{address}/{action}",
    tag = "devices",
    params(
        ("address" = String, Path, description = "Device address"),
        ("action" = ControlAction, Path, description = "Control to apply")
    ),
    responses(
        (status = 200, description = "Control applied", body = ControlResponse),
        (status = 404, description = "Unknown address", body = ApiError)
    )
)]
pub async fn control(
    State(state): State<Arc<AppState>>,
    Path((address, action)): Path<(String, ControlAction)>,
) -> Result<Json<ControlResponse>, AppError> {
    let fleet = &state.fleet;
    let target = address.clone();
    match action {
        ControlAction::Pause => fleet.ask(PauseDevice { address: target }).await?,
        ControlAction::Unpause => fleet.ask(UnpauseDevice { address: target }).await?,
        ControlAction::Light => fleet.ask(LightDevice { address: target }).await?,
        ControlAction::Unlight => fleet.ask(UnlightDevice { address: target }).await?,
    }

    Ok(Json(ControlResponse::success(address, action)))
}

/// Read back the pause or light flag of a device
///
/// # Errors
/// Returns `AppError` with 404 if the address is not registered
#[utoipa::path(
    get,
    path = "/devices/{address}/{action}",
    tag = "devices",
    params(
        ("address" = String, Path, description = "Device address"),
        ("action" = DeviceFlag, Path, description = "Flag to read")
    ),
    responses(
        (status = 200, description = "Current flag value", body = FlagResponse),
        (status = 404, description = "Unknown address", body = ApiError)
    )
)]
pub async fn check_flag(
    State(state): State<Arc<AppState>>,
    Path((address, flag)): Path<(String, DeviceFlag)>,
) -> Result<Json<FlagResponse>, AppError> {
    let target = address.clone();
    let value = match flag {
        DeviceFlag::Pause => state.fleet.ask(CheckPause { address: target }).await?,
        DeviceFlag::Light => state.fleet.ask(CheckLight { address: target }).await?,
    };

    Ok(Json(FlagResponse { ip: address, value }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use minefleet_core::MinerConfig;

    use super::*;
    use crate::config::Config;
    use crate::factory::DefaultDeviceFactory;
    use crate::state::App;

    // Lifecycles are never started, so nothing here touches the network
    async fn state(addresses: &[&str]) -> Arc<AppState> {
        let config = Config {
            miner: addresses.iter().map(|a| MinerConfig::new(*a)).collect(),
            ..Config::default()
        };
        App::build(config, Arc::new(DefaultDeviceFactory::new()))
            .await
            .unwrap()
            .state()
    }

    fn path(address: &str, action: ControlAction) -> Path<(String, ControlAction)> {
        Path((address.to_string(), action))
    }

    #[tokio::test]
    async fn test_list_devices_in_registration_order() {
        let state = state(&["192.0.2.7", "192.0.2.3"]).await;

        let Json(devices) = list_devices(State(state)).await.unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].address, "192.0.2.7");
        assert_eq!(devices[1].address, "192.0.2.3");
        assert_eq!(devices[0].state, "start");
        assert!(!devices[0].paused);
    }

    #[tokio::test]
    async fn test_pause_then_check() {
        let state = state(&["192.0.2.7"]).await;

        let Json(ack) = control(State(state.clone()), path("192.0.2.7", ControlAction::Pause))
            .await
            .unwrap();
        assert_eq!(ack.ip, "192.0.2.7");
        assert_eq!(ack.result, "success");

        let Json(flag) = check_flag(
            State(state.clone()),
            Path(("192.0.2.7".to_string(), DeviceFlag::Pause)),
        )
        .await
        .unwrap();
        assert!(flag.value);

        control(State(state.clone()), path("192.0.2.7", ControlAction::Unpause))
            .await
            .unwrap();
        let Json(flag) = check_flag(
            State(state),
            Path(("192.0.2.7".to_string(), DeviceFlag::Pause)),
        )
        .await
        .unwrap();
        assert!(!flag.value);
    }

    #[tokio::test]
    async fn test_unknown_address_is_404() {
        let state = state(&["192.0.2.7"]).await;

        let err = control(State(state.clone()), path("192.0.2.99", ControlAction::Pause))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = check_flag(
            State(state),
            Path(("192.0.2.99".to_string(), DeviceFlag::Light)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
