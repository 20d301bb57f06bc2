//! Fleet snapshot endpoint

use std::sync::Arc;

use axum::{Json, extract::State};

use minefleet_api::FleetSnapshot;

use crate::state::AppState;

/// Latest fleet snapshot
///
/// Before the first poll completes this is the zero-valued placeholder for
/// every registered device.
#[utoipa::path(
    get,
    path = "/fleet",
    tag = "fleet",
    responses((status = 200, description = "One entry per device in registration order", body = FleetSnapshot))
)]
pub async fn snapshot(State(state): State<Arc<AppState>>) -> Json<FleetSnapshot> {
    Json(state.snapshots.borrow().clone())
}

#[cfg(test)]
mod tests {
    use minefleet_core::MinerConfig;

    use super::*;
    use crate::config::Config;
    use crate::factory::DefaultDeviceFactory;
    use crate::state::App;

    #[tokio::test]
    async fn test_placeholder_before_first_poll() {
        let config = Config {
            miner: vec![MinerConfig::new("192.0.2.1"), MinerConfig::new("192.0.2.2")],
            ..Config::default()
        };
        let app = App::build(config, Arc::new(DefaultDeviceFactory::new()))
            .await
            .unwrap();

        let Json(snapshot) = snapshot(State(app.state())).await;

        assert_eq!(
            snapshot.addresses().collect::<Vec<_>>(),
            vec!["192.0.2.1", "192.0.2.2"]
        );
        let body = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(body["miners"][0]["IP"], "192.0.2.1");
        assert_eq!(body["miners"][0]["Light"], false);
    }
}
