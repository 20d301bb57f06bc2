//! System endpoints

use axum::Json;

use minefleet_api::HealthResponse;

/// Liveness check for the daemon itself
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Daemon is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
