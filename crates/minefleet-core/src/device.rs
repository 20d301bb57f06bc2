//! `DeviceController`: per-device state and lifecycle
//!
//! The lifecycle task owns every multi-step mutation of a device. Control
//! calls from the fleet boundary only flip the pause gate or the fault-light
//! flag, both single-field writes.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, error, info, instrument, warn};

use minefleet_api::{FleetEvent, StatsSnapshot};
use minefleet_exec::{CommandResult, ExecError, RetryPolicy, retry_if, run_with_retry};
use minefleet_telemetry::{
    FirmwareKind, TelemetryError, classify_version, commands, normalize_stats,
};

use crate::config::{FleetSettings, MinerConfig};
use crate::deps::DeviceDeps;
use crate::error::{CoreError, UnlockError};
use crate::gate::PauseGate;
use crate::message::DeviceStatus;
use crate::message_log::MessageLog;
use crate::provision::ProvisioningPipeline;
use crate::state::{LifecycleEvent, LifecycleState, VersionStatus};

/// Attempts for a refused version query: the first plus three retries
const VERSION_QUERY_ATTEMPTS: u32 = 4;

/// Owns one device's state and drives its lifecycle
pub struct DeviceController {
    address: String,
    deps: DeviceDeps,
    settings: Arc<FleetSettings>,
    gate: PauseGate,
    /// Fault-indicator flag, operator intent
    light: AtomicBool,
    /// Set while managed firmware answers the stats API
    operational: AtomicBool,
    log: MessageLog,
    state: watch::Sender<LifecycleState>,
    last_stats: Mutex<Option<StatsSnapshot>>,
    event_tx: broadcast::Sender<FleetEvent>,
}

impl DeviceController {
    #[must_use]
    pub fn new(
        config: MinerConfig,
        deps: DeviceDeps,
        settings: Arc<FleetSettings>,
        event_tx: broadcast::Sender<FleetEvent>,
    ) -> Self {
        let (state, _) = watch::channel(LifecycleState::Start);
        let log = MessageLog::new(settings.provisioning.message_log_capacity);

        Self {
            address: config.address,
            deps,
            settings,
            gate: PauseGate::new(),
            light: AtomicBool::new(false),
            operational: AtomicBool::new(false),
            log,
            state,
            last_stats: Mutex::new(None),
            event_tx,
        }
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub(crate) fn settings(&self) -> &FleetSettings {
        &self.settings
    }

    pub(crate) fn deps(&self) -> &DeviceDeps {
        &self.deps
    }

    // ------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------

    pub fn pause(&self) {
        self.gate.clear();
        info!(address = %self.address, "paused");
        let _ = self.event_tx.send(FleetEvent::DevicePaused {
            address: self.address.clone(),
            paused: true,
        });
    }

    pub fn unpause(&self) {
        self.gate.set();
        info!(address = %self.address, "unpaused");
        let _ = self.event_tx.send(FleetEvent::DevicePaused {
            address: self.address.clone(),
            paused: false,
        });
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        !self.gate.is_set()
    }

    /// Turn the fault indicator on
    ///
    /// The flag is set right away; the remote command runs detached and its
    /// failure does not clear it.
    pub fn light(&self) {
        self.set_light(true);
        self.send_fault_light(true);
    }

    /// Turn the fault indicator off
    pub fn unlight(&self) {
        self.set_light(false);
        self.send_fault_light(false);
    }

    #[must_use]
    pub fn is_lit(&self) -> bool {
        self.light.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_operational(&self) -> bool {
        self.operational.load(Ordering::SeqCst)
    }

    fn set_light(&self, on: bool) {
        self.light.store(on, Ordering::SeqCst);
        let _ = self.event_tx.send(FleetEvent::DeviceLight {
            address: self.address.clone(),
            light: on,
        });
    }

    fn send_fault_light(&self, on: bool) {
        let shell = self.deps.shell.clone();
        let address = self.address.clone();
        let command = format!("miner fault_light {}", if on { "on" } else { "off" });

        tokio::spawn(async move {
            if run_with_retry(shell.as_ref(), &command, RetryPolicy::default())
                .await
                .is_none()
            {
                warn!(address, command, "fault light command failed");
            }
        });
    }

    // ------------------------------------------------------------------
    // Messages and snapshots
    // ------------------------------------------------------------------

    /// Prepend a line to the message log
    pub async fn log(&self, line: impl Into<String>) {
        let line = line.into();
        info!(address = %self.address, message = %line, "device message");
        self.log.push(line.clone()).await;
        let _ = self.event_tx.send(FleetEvent::DeviceMessage {
            address: self.address.clone(),
            message: line,
        });
    }

    /// Message log, most recent first
    pub async fn messages(&self) -> Vec<String> {
        self.log.lines().await
    }

    /// Current stats, or the message log while telemetry is unavailable
    ///
    /// Never fails: connectivity and protocol errors turn into the fallback
    /// snapshot.
    pub async fn stats(&self) -> StatsSnapshot {
        if !self.is_operational() {
            return self.fallback_snapshot().await;
        }

        let stats = self
            .deps
            .telemetry
            .fetch(&self.address, commands::STATS)
            .await
            .and_then(|raw| normalize_stats(&raw));

        match stats {
            Ok(stats) => {
                let snapshot = StatsSnapshot::telemetry(&self.address, self.is_lit(), stats);
                *self.last_stats.lock().await = Some(snapshot.clone());
                snapshot
            }
            Err(e) => {
                debug!(address = %self.address, error = %e, "stats unavailable, using message log");
                self.fallback_snapshot().await
            }
        }
    }

    /// Snapshot carrying the message log
    pub async fn fallback_snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::messages(&self.address, self.is_lit(), self.log.lines().await)
    }

    /// Last successful stats with the current light flag, else the fallback
    pub async fn last_known_or_fallback(&self) -> StatsSnapshot {
        let last = self.last_stats.lock().await.clone();
        match last {
            Some(mut snapshot) if self.is_operational() => {
                snapshot.light = self.is_lit();
                snapshot
            }
            _ => self.fallback_snapshot().await,
        }
    }

    /// Operator view of the device
    pub async fn status(&self) -> DeviceStatus {
        DeviceStatus {
            address: self.address.clone(),
            state: self.state(),
            paused: self.is_paused(),
            light: self.is_lit(),
            operational: self.is_operational(),
            messages: self.log.lines().await,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Run the lifecycle until a transition is rejected
    ///
    /// # Errors
    /// Returns `CoreError::InvalidTransition` if a step produces an event its
    /// state does not accept.
    pub async fn run(&self) -> Result<(), CoreError> {
        info!(address = %self.address, "lifecycle started");
        loop {
            self.tick().await?;
            tokio::time::sleep(self.settings.timings.tick).await;
        }
    }

    /// Run one lifecycle tick and return the resulting state
    ///
    /// A step leaving `Start` falls through to the next state's step within
    /// the same tick.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidTransition` on a rejected event.
    pub async fn tick(&self) -> Result<LifecycleState, CoreError> {
        let from = self.state();
        let next = self.advance(from).await?;

        if from == LifecycleState::Start && next != LifecycleState::Start {
            return self.advance(next).await;
        }

        Ok(next)
    }

    async fn advance(&self, state: LifecycleState) -> Result<LifecycleState, CoreError> {
        let event = self.step(state).await;
        let next = state.next(event)?;
        self.transition_to(next);
        Ok(next)
    }

    fn transition_to(&self, next: LifecycleState) {
        let from = self.state.send_replace(next);
        if from == next {
            return;
        }

        info!(address = %self.address, from = %from, to = %next, "state transition");

        let _ = self.event_tx.send(FleetEvent::DeviceStateChanged {
            address: self.address.clone(),
            from: from.to_string(),
            to: next.to_string(),
        });
    }

    #[instrument(skip(self), fields(address = %self.address))]
    async fn step(&self, state: LifecycleState) -> LifecycleEvent {
        match state {
            LifecycleState::Start => self.start_step().await,
            LifecycleState::Install => match ProvisioningPipeline::new(self).install().await {
                Ok(()) => LifecycleEvent::Installed,
                Err(e) => {
                    error!(address = %self.address, error = %e, "install aborted");
                    self.log(format!("Install failed: {e}")).await;
                    LifecycleEvent::InstallFailed
                }
            },
            LifecycleState::Update => {
                ProvisioningPipeline::new(self).update().await;
                LifecycleEvent::Updated
            }
            LifecycleState::Referral => {
                self.settle(self.settings.timings.settle).await;
                ProvisioningPipeline::new(self).configure().await;
                LifecycleEvent::Configured
            }
            LifecycleState::Done => {
                self.operational.store(true, Ordering::SeqCst);
                self.log("Running").await;
                self.wait_for_disconnect().await;
                self.operational.store(false, Ordering::SeqCst);
                *self.last_stats.lock().await = None;
                if self.is_lit() {
                    self.set_light(false);
                }
                self.log("Disconnected").await;
                LifecycleEvent::Disconnected
            }
        }
    }

    async fn start_step(&self) -> LifecycleEvent {
        let ports = self.settings.ports;

        self.checkpoint().await;
        if !self.deps.probe.is_open(&self.address, ports.liveness).await {
            self.log("Down...").await;
            return LifecycleEvent::LivenessDown;
        }

        self.checkpoint().await;
        if self.deps.probe.is_open(&self.address, ports.shell).await {
            self.log("Checking firmware...").await;
            let status = self.query_version().await;
            self.log(format!("Firmware: {status}")).await;

            if matches!(
                status,
                VersionStatus::Unknown | VersionStatus::LegacyAppliance
            ) {
                self.settle(self.settings.timings.settle).await;
            }
            return LifecycleEvent::Version(status);
        }

        self.log("Unlocking...").await;
        match self.unlock().await {
            Ok(()) => {
                self.log("Unlocked").await;
                self.settle(self.settings.timings.settle).await;
                LifecycleEvent::Unlocked
            }
            Err(e) => {
                warn!(address = %self.address, error = %e, "unlock failed");
                self.log(format!("Unlock failed: {e}")).await;
                self.wait_for_disconnect().await;
                LifecycleEvent::UnlockFailed
            }
        }
    }

    // ------------------------------------------------------------------
    // Checkpoints and waits
    // ------------------------------------------------------------------

    /// Block while paused, logging once on entry
    pub async fn checkpoint(&self) {
        if !self.gate.is_set() {
            self.log("Paused...").await;
        }
        self.gate.wait().await;
    }

    /// Checkpoint, then sleep
    pub(crate) async fn settle(&self, duration: Duration) {
        self.checkpoint().await;
        tokio::time::sleep(duration).await;
    }

    /// Poll liveness until the device drops off
    async fn wait_for_disconnect(&self) {
        let port = self.settings.ports.liveness;
        loop {
            self.checkpoint().await;
            if !self.deps.probe.is_open(&self.address, port).await {
                return;
            }
            tokio::time::sleep(self.settings.timings.liveness_poll).await;
        }
    }

    /// Poll liveness until the device comes back
    pub(crate) async fn wait_for_return(&self) {
        let port = self.settings.ports.liveness;
        loop {
            self.checkpoint().await;
            if self.deps.probe.is_open(&self.address, port).await {
                return;
            }
            tokio::time::sleep(self.settings.timings.liveness_poll).await;
        }
    }

    // ------------------------------------------------------------------
    // Version query and unlock
    // ------------------------------------------------------------------

    /// Classify the firmware the device is running
    ///
    /// Refused connections are retried; a timeout is returned at once.
    #[instrument(skip(self), fields(address = %self.address))]
    pub async fn query_version(&self) -> VersionStatus {
        let timings = self.settings.timings;
        let policy = RetryPolicy::new(VERSION_QUERY_ATTEMPTS, timings.version_retry);
        let telemetry = self.deps.telemetry.as_ref();

        let reply = retry_if(policy, TelemetryError::is_refused, |_| async move {
            tokio::time::timeout(
                timings.version_timeout,
                telemetry.fetch(&self.address, commands::VERSION),
            )
            .await
            .map_err(|_| TelemetryError::Timeout(timings.version_timeout))?
        })
        .await;

        match reply {
            Ok(value) => match classify_version(&value) {
                FirmwareKind::Managed { daemon } => {
                    debug!(address = %self.address, daemon, "managed firmware");
                    self.installed_version_status().await
                }
                FirmwareKind::Legacy { daemon } => {
                    debug!(address = %self.address, daemon, "stock firmware");
                    VersionStatus::LegacyAppliance
                }
                FirmwareKind::Unknown => VersionStatus::Unknown,
            },
            Err(e) if e.is_timeout() => VersionStatus::Timeout,
            Err(e) => {
                debug!(address = %self.address, error = %e, "version query gave up");
                VersionStatus::Unknown
            }
        }
    }

    /// Compare the installed release marker with the newest release
    async fn installed_version_status(&self) -> VersionStatus {
        let provisioning = &self.settings.provisioning;
        let command = format!("cat {}", provisioning.version_marker_path);

        match self.remote(&command).await {
            Some(result) if result.success() && result.stdout.trim() == provisioning.newest_version => {
                VersionStatus::ManagedCurrent
            }
            Some(result) => {
                debug!(
                    address = %self.address,
                    installed = %result.stdout.trim(),
                    newest = %provisioning.newest_version,
                    "managed firmware outdated"
                );
                VersionStatus::ManagedOld
            }
            None => VersionStatus::ManagedOld,
        }
    }

    async fn unlock(&self) -> Result<(), UnlockError> {
        let unlock = &self.settings.provisioning.unlock;
        let args = vec![self.address.clone(), unlock.user.clone()];

        let result = self
            .deps
            .tools
            .run(&unlock.program, &args)
            .await
            .map_err(|e| UnlockError::Tool(e.to_string()))?;

        if result.combined_output().contains(&unlock.manual_reset_marker) {
            return Err(UnlockError::ManualResetRequired);
        }
        if !result.success() {
            return Err(UnlockError::Failed(result.status));
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Remote shell helpers
    // ------------------------------------------------------------------

    /// Run a remote command with the default retry policy
    pub(crate) async fn remote(&self, command: &str) -> Option<CommandResult> {
        run_with_retry(self.deps.shell.as_ref(), command, RetryPolicy::default()).await
    }

    /// Copy a file, retrying transport failures; false once it gave up
    pub(crate) async fn push_file(&self, local: &Path, remote: &str) -> bool {
        let shell = self.deps.shell.as_ref();
        let copied = retry_if(RetryPolicy::default(), ExecError::is_retryable, |_| {
            shell.copy_file(local, remote)
        });
        match copied.await {
            Ok(()) => true,
            Err(e) => {
                error!(address = %self.address, local = %local.display(), remote, error = %e, "copy failed");
                false
            }
        }
    }

    /// Copy a directory, retrying transport failures; false once it gave up
    pub(crate) async fn push_dir(&self, local: &Path, remote: &str) -> bool {
        let shell = self.deps.shell.as_ref();
        let copied = retry_if(RetryPolicy::default(), ExecError::is_retryable, |_| {
            shell.copy_dir(local, remote, true)
        });
        match copied.await {
            Ok(()) => true,
            Err(e) => {
                error!(address = %self.address, local = %local.display(), remote, error = %e, "directory copy failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for DeviceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceController")
            .field("address", &self.address)
            .field("state", &self.state())
            .field("paused", &self.is_paused())
            .field("light", &self.is_lit())
            .field("operational", &self.is_operational())
            .finish_non_exhaustive()
    }
}

/// Spawn the lifecycle of `device` as a detached task
///
/// The task is not supervised; a fault ends it for good.
pub fn spawn_lifecycle(device: Arc<DeviceController>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = device.run().await {
            error!(address = %device.address(), error = %e, "lifecycle task ended");
        }
    })
}
