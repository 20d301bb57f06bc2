//! Application state shared across HTTP handlers

use std::sync::Arc;

use eyre::eyre;
use kameo::actor::{ActorRef, Spawn};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::info;

use minefleet_api::{FleetEvent, FleetSnapshot};
use minefleet_core::{
    BasicSnapshot, DeviceFactory, FleetActor, FleetActorArgs, PollLoop, RegisterDevice, RunFlag,
    StartLifecycles,
};

use crate::config::Config;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Reference to the fleet actor
    pub fleet: ActorRef<FleetActor>,
    /// Application configuration
    pub config: Arc<Config>,
    /// Latest fleet snapshot
    pub snapshots: watch::Receiver<FleetSnapshot>,
    /// Fleet event broadcast
    pub events: broadcast::Sender<FleetEvent>,
    /// Cleared to stop the poll loop
    pub running: RunFlag,
}

/// Everything the process entry point owns
pub struct App {
    state: Arc<AppState>,
    snapshot_tx: watch::Sender<FleetSnapshot>,
}

impl App {
    /// Spawn the fleet actor and register every configured device
    ///
    /// # Errors
    /// Returns error if a device cannot be registered, e.g. a duplicate
    /// address.
    pub async fn build(config: Config, factory: Arc<dyn DeviceFactory>) -> eyre::Result<Self> {
        let (events, _) = broadcast::channel(config.daemon.event_channel_capacity);

        let fleet = FleetActor::spawn(FleetActorArgs {
            settings: Arc::new(config.fleet_settings()),
            factory,
            event_tx: events.clone(),
            poll_timeout: config.daemon.poll_timeout(),
        });

        for miner in &config.miner {
            fleet
                .ask(RegisterDevice {
                    config: miner.clone(),
                })
                .await
                .map_err(|e| eyre!("failed to register {}: {e}", miner.address))?;
        }

        let placeholder = fleet
            .ask(BasicSnapshot)
            .await
            .map_err(|e| eyre!("failed to build placeholder snapshot: {e}"))?;
        let (snapshot_tx, snapshots) = watch::channel(FleetSnapshot::new(placeholder));

        info!(devices = config.miner.len(), "fleet registered");

        Ok(Self {
            state: Arc::new(AppState {
                fleet,
                config: Arc::new(config),
                snapshots,
                events,
                running: RunFlag::new(),
            }),
            snapshot_tx,
        })
    }

    #[must_use]
    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Start the device lifecycles and the poll loop
    ///
    /// # Errors
    /// Returns error if the fleet actor is gone.
    pub async fn start(self) -> eyre::Result<JoinHandle<()>> {
        let started = self
            .state
            .fleet
            .ask(StartLifecycles)
            .await
            .map_err(|e| eyre!("failed to start lifecycles: {e}"))?;
        info!(started, "device lifecycles running");

        let poller = PollLoop::new(
            self.state.fleet.clone(),
            self.state.config.daemon.poll_interval(),
            self.state.running.clone(),
            self.snapshot_tx,
            self.state.events.clone(),
        );

        Ok(tokio::spawn(poller.run()))
    }
}
