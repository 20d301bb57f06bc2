//! Periodic fleet poll loop

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use kameo::actor::ActorRef;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info};

use minefleet_api::{FleetEvent, FleetSnapshot};

use crate::actor::fleet::FleetActor;
use crate::message::PollFleet;

/// Shared flag that keeps the poll loop going
#[derive(Debug, Clone)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    /// New flag, running
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Stop after the in-flight cycle
    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls the fleet on a fixed interval and publishes each snapshot
pub struct PollLoop {
    fleet: ActorRef<FleetActor>,
    interval: Duration,
    running: RunFlag,
    snapshot_tx: watch::Sender<FleetSnapshot>,
    event_tx: broadcast::Sender<FleetEvent>,
}

impl PollLoop {
    #[must_use]
    pub fn new(
        fleet: ActorRef<FleetActor>,
        interval: Duration,
        running: RunFlag,
        snapshot_tx: watch::Sender<FleetSnapshot>,
        event_tx: broadcast::Sender<FleetEvent>,
    ) -> Self {
        Self {
            fleet,
            interval,
            running,
            snapshot_tx,
            event_tx,
        }
    }

    /// Poll until the run flag is cleared
    ///
    /// The flag is checked before each cycle; a cycle in flight always
    /// completes.
    pub async fn run(self) {
        info!(interval = ?self.interval, "poll loop started");

        while self.running.is_running() {
            match self.fleet.ask(PollFleet).await {
                Ok(miners) => {
                    let snapshot = FleetSnapshot::new(miners);
                    debug!(devices = snapshot.len(), "publishing snapshot");
                    self.snapshot_tx.send_replace(snapshot.clone());
                    let _ = self.event_tx.send(FleetEvent::Snapshot { snapshot });
                }
                Err(e) => {
                    error!(error = %e, "fleet poll failed");
                }
            }

            tokio::time::sleep(self.interval).await;
        }

        info!("poll loop stopped");
    }
}
