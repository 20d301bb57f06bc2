//! HTTP router configuration

use std::sync::Arc;

use axum::{
    Json, Router,
    routing::{get, post},
};
use utoipa::OpenApi;

use crate::api::{ApiDoc, devices, fleet, system};
use crate::state::AppState;

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // System endpoints
        .route("/health", get(system::health))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        // Fleet
        .route("/fleet", get(fleet::snapshot))
        // Devices
        .route("/devices", get(devices::list_devices))
        .route(
            "/devices/{address}/{action}",
            post(devices::control).get(devices::check_flag),
        )
        .with_state(state)
}
