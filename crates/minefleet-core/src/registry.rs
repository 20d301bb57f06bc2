//! `FleetRegistry`: every device controller, keyed by address
//!
//! Offers the fan-out poll and the address-indexed control calls the
//! transport boundary uses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use minefleet_api::{FleetEvent, FleetSnapshot, StatsSnapshot};

use crate::config::{FleetSettings, MinerConfig};
use crate::deps::DeviceFactory;
use crate::device::{DeviceController, spawn_lifecycle};
use crate::error::CoreError;
use crate::message::DeviceStatus;

/// Registry of device controllers in registration order
pub struct FleetRegistry {
    devices: Vec<Arc<DeviceController>>,
    /// Address to position in `devices`
    index: HashMap<String, usize>,
    settings: Arc<FleetSettings>,
    factory: Arc<dyn DeviceFactory>,
    event_tx: broadcast::Sender<FleetEvent>,
    /// Per-device bound inside `poll`
    poll_timeout: Duration,
    lifecycles_started: bool,
}

impl FleetRegistry {
    #[must_use]
    pub fn new(
        settings: Arc<FleetSettings>,
        factory: Arc<dyn DeviceFactory>,
        event_tx: broadcast::Sender<FleetEvent>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            devices: Vec::new(),
            index: HashMap::new(),
            settings,
            factory,
            event_tx,
            poll_timeout,
            lifecycles_started: false,
        }
    }

    /// Create a controller for `config` and append it
    ///
    /// # Errors
    /// Returns `CoreError::AddressAlreadyRegistered` for a duplicate address.
    pub async fn register(
        &mut self,
        config: MinerConfig,
    ) -> Result<Arc<DeviceController>, CoreError> {
        if self.index.contains_key(&config.address) {
            return Err(CoreError::AddressAlreadyRegistered(config.address));
        }

        let deps = self.factory.create_deps(&config, &self.settings).await;
        let address = config.address.clone();
        let device = Arc::new(DeviceController::new(
            config,
            deps,
            self.settings.clone(),
            self.event_tx.clone(),
        ));

        if self.lifecycles_started {
            spawn_lifecycle(device.clone());
        }

        self.index.insert(address.clone(), self.devices.len());
        self.devices.push(device.clone());

        info!(address, "registered device");
        Ok(device)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Look up a device
    ///
    /// # Errors
    /// Returns `CoreError::AddressNotFound` if `address` is not registered.
    pub fn get(&self, address: &str) -> Result<&Arc<DeviceController>, CoreError> {
        self.index
            .get(address)
            .and_then(|&i| self.devices.get(i))
            .ok_or_else(|| CoreError::AddressNotFound(address.to_string()))
    }

    /// Poll every device concurrently
    ///
    /// The result holds one entry per device in registration order. A
    /// device slower than the poll timeout contributes its last known
    /// snapshot, or its message log. The returned future owns its device
    /// handles, so it can run after the registry moves on.
    pub fn poll(&self) -> impl Future<Output = FleetSnapshot> + Send + use<> {
        poll_devices(self.devices.clone(), self.poll_timeout)
    }

    /// Zero-valued placeholder for every device
    #[must_use]
    pub fn basic_snapshot(&self) -> FleetSnapshot {
        FleetSnapshot::new(
            self.devices
                .iter()
                .map(|d| StatsSnapshot::placeholder(d.address()))
                .collect(),
        )
    }

    /// Start one unsupervised lifecycle task per device
    ///
    /// Devices registered afterwards start their own. A second call starts
    /// nothing.
    pub fn run_lifecycles(&mut self) -> Vec<JoinHandle<()>> {
        if self.lifecycles_started {
            warn!("lifecycles already running");
            return Vec::new();
        }
        self.lifecycles_started = true;

        info!(devices = self.devices.len(), "starting lifecycles");
        self.devices.iter().cloned().map(spawn_lifecycle).collect()
    }

    /// # Errors
    /// Returns `CoreError::AddressNotFound` if `address` is not registered.
    pub fn pause(&self, address: &str) -> Result<(), CoreError> {
        self.get(address)?.pause();
        Ok(())
    }

    /// # Errors
    /// Returns `CoreError::AddressNotFound` if `address` is not registered.
    pub fn unpause(&self, address: &str) -> Result<(), CoreError> {
        self.get(address)?.unpause();
        Ok(())
    }

    /// # Errors
    /// Returns `CoreError::AddressNotFound` if `address` is not registered.
    pub fn check_pause(&self, address: &str) -> Result<bool, CoreError> {
        Ok(self.get(address)?.is_paused())
    }

    /// # Errors
    /// Returns `CoreError::AddressNotFound` if `address` is not registered.
    pub fn light(&self, address: &str) -> Result<(), CoreError> {
        self.get(address)?.light();
        Ok(())
    }

    /// # Errors
    /// Returns `CoreError::AddressNotFound` if `address` is not registered.
    pub fn unlight(&self, address: &str) -> Result<(), CoreError> {
        self.get(address)?.unlight();
        Ok(())
    }

    /// # Errors
    /// Returns `CoreError::AddressNotFound` if `address` is not registered.
    pub fn check_light(&self, address: &str) -> Result<bool, CoreError> {
        Ok(self.get(address)?.is_lit())
    }

    /// Status of every device in registration order
    pub async fn statuses(&self) -> Vec<DeviceStatus> {
        join_all(self.devices.iter().map(|d| d.status())).await
    }
}

#[instrument(skip(devices), fields(devices = devices.len()))]
async fn poll_devices(devices: Vec<Arc<DeviceController>>, timeout: Duration) -> FleetSnapshot {
    let polls = devices.iter().map(|device| async move {
        match tokio::time::timeout(timeout, device.stats()).await {
            Ok(snapshot) => snapshot,
            Err(_) => {
                warn!(address = %device.address(), ?timeout, "poll timed out");
                device.last_known_or_fallback().await
            }
        }
    });

    let snapshot = FleetSnapshot::new(join_all(polls).await);
    debug!(
        fallbacks = snapshot.miners.iter().filter(|m| m.is_fallback()).count(),
        "fleet polled"
    );
    snapshot
}
