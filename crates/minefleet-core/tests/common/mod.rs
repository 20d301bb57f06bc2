//! In-memory collaborators for controller and fleet tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::broadcast;

use minefleet_api::FleetEvent;
use minefleet_core::{
    DeviceController, DeviceDeps, DeviceFactory, FleetSettings, MinerConfig,
};
use minefleet_exec::{CommandResult, ExecError, RemoteShell, ToolRunner};
use minefleet_telemetry::{PortProbe, Telemetry, TelemetryError, commands};

pub const NEWEST: &str = "2024-05-01-0-c2a6e5a2-23.03.4-plus";
pub const LIVENESS_PORT: u16 = 80;
pub const SHELL_PORT: u16 = 22;

pub fn ok(stdout: &str) -> CommandResult {
    CommandResult {
        status: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
        duration: Duration::from_millis(1),
    }
}

pub fn managed_version() -> Value {
    json!({
        "STATUS": [{"STATUS": "S"}],
        "VERSION": [{"BOSminer": "0.2.0-2a8ec7f4", "API": "3.7"}]
    })
}

pub fn stock_version() -> Value {
    json!({"VERSION": [{"CGMiner": "4.9.0", "API": "3.1"}]})
}

pub fn stats_response() -> Value {
    json!({
        "devs": [{"DEVS": [{"ID": 6, "MHS 5s": 1_129_792.59}]}],
        "temps": [{"TEMPS": [{"ID": 6, "Board": 83.1875, "Chip": 88.875}]}],
        "fans": [{"FANS": [{"ID": 0, "RPM": 1440, "Speed": 40}]}]
    })
}

// ============================================================================
// Telemetry
// ============================================================================

pub struct MockTelemetry {
    /// Replies to `version`, consumed front to back; the last one repeats
    version: Mutex<VecDeque<Result<Value, TelemetryError>>>,
    stats: Mutex<Result<Value, TelemetryError>>,
    /// Delay before answering `devs+temps+fans`
    stats_delay: Mutex<Duration>,
    /// Delay before answering `version`
    version_delay: Mutex<Duration>,
    pub version_calls: AtomicU32,
    pub stats_calls: AtomicU32,
}

impl MockTelemetry {
    pub fn new() -> Self {
        Self {
            version: Mutex::new(VecDeque::from([Ok(managed_version())])),
            stats: Mutex::new(Ok(stats_response())),
            stats_delay: Mutex::new(Duration::ZERO),
            version_delay: Mutex::new(Duration::ZERO),
            version_calls: AtomicU32::new(0),
            stats_calls: AtomicU32::new(0),
        }
    }

    pub fn with_version(self, replies: Vec<Result<Value, TelemetryError>>) -> Self {
        *self.version.lock().unwrap() = replies.into();
        self
    }

    pub fn with_stats(self, reply: Result<Value, TelemetryError>) -> Self {
        *self.stats.lock().unwrap() = reply;
        self
    }

    pub fn with_stats_delay(self, delay: Duration) -> Self {
        *self.stats_delay.lock().unwrap() = delay;
        self
    }

    pub fn with_version_delay(self, delay: Duration) -> Self {
        *self.version_delay.lock().unwrap() = delay;
        self
    }

    fn next_version(&self) -> Result<Value, TelemetryError> {
        let mut replies = self.version.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies
                .front()
                .cloned()
                .unwrap_or_else(|| Err(TelemetryError::Protocol("no reply".to_string())))
        }
    }
}

#[async_trait]
impl Telemetry for MockTelemetry {
    async fn fetch(&self, _address: &str, command: &str) -> Result<Value, TelemetryError> {
        if command == commands::VERSION {
            self.version_calls.fetch_add(1, Ordering::SeqCst);
            let delay = *self.version_delay.lock().unwrap();
            tokio::time::sleep(delay).await;
            self.next_version()
        } else {
            self.stats_calls.fetch_add(1, Ordering::SeqCst);
            let delay = *self.stats_delay.lock().unwrap();
            tokio::time::sleep(delay).await;
            self.stats.lock().unwrap().clone()
        }
    }
}

// ============================================================================
// Remote shell
// ============================================================================

pub struct MockShell {
    address: String,
    /// Every `run` fails with a connection error
    pub fail: AtomicBool,
    /// stdout by exact command
    replies: Mutex<HashMap<String, String>>,
    pub commands: Mutex<Vec<String>>,
    pub copies: Mutex<Vec<(String, String)>>,
    /// Returned by every copy attempt when set
    copy_error: Mutex<Option<ExecError>>,
}

impl MockShell {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            fail: AtomicBool::new(false),
            replies: Mutex::new(HashMap::new()),
            commands: Mutex::new(Vec::new()),
            copies: Mutex::new(Vec::new()),
            copy_error: Mutex::new(None),
        }
    }

    pub fn with_copy_error(self, err: ExecError) -> Self {
        *self.copy_error.lock().unwrap() = Some(err);
        self
    }

    pub fn failing(address: &str) -> Self {
        let shell = Self::new(address);
        shell.fail.store(true, Ordering::SeqCst);
        shell
    }

    pub fn reply(self, command: &str, stdout: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(command.to_string(), stdout.to_string());
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn copies(&self) -> Vec<(String, String)> {
        self.copies.lock().unwrap().clone()
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.commands().iter().any(|c| c.contains(needle))
    }
}

#[async_trait]
impl RemoteShell for MockShell {
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.commands.lock().unwrap().push(cmd.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(ExecError::ConnectionFailed("unreachable".to_string()));
        }
        let stdout = self
            .replies
            .lock()
            .unwrap()
            .get(cmd)
            .cloned()
            .unwrap_or_default();
        Ok(ok(&stdout))
    }

    async fn copy_file(&self, local: &Path, remote: &str) -> Result<(), ExecError> {
        self.copies
            .lock()
            .unwrap()
            .push((local.display().to_string(), remote.to_string()));
        match self.copy_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn copy_dir(&self, local: &Path, remote: &str, _recursive: bool) -> Result<(), ExecError> {
        self.copy_file(local, remote).await
    }

    fn address(&self) -> &str {
        &self.address
    }
}

// ============================================================================
// Port probe
// ============================================================================

pub struct MockProbe {
    pub liveness: AtomicBool,
    pub shell: AtomicBool,
    pub calls: AtomicU32,
}

impl MockProbe {
    pub fn new(liveness: bool, shell: bool) -> Self {
        Self {
            liveness: AtomicBool::new(liveness),
            shell: AtomicBool::new(shell),
            calls: AtomicU32::new(0),
        }
    }

    pub fn set_liveness(&self, open: bool) {
        self.liveness.store(open, Ordering::SeqCst);
    }
}

#[async_trait]
impl PortProbe for MockProbe {
    async fn is_open(&self, _address: &str, port: u16) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match port {
            LIVENESS_PORT => self.liveness.load(Ordering::SeqCst),
            SHELL_PORT => self.shell.load(Ordering::SeqCst),
            _ => false,
        }
    }
}

// ============================================================================
// Local tools
// ============================================================================

pub struct MockTools {
    result: Mutex<Result<CommandResult, ExecError>>,
    pub calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl MockTools {
    pub fn new(result: Result<CommandResult, ExecError>) -> Self {
        Self {
            result: Mutex::new(result),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Ok(ok("done")))
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolRunner for MockTools {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandResult, ExecError> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));
        self.result.lock().unwrap().clone()
    }
}

// ============================================================================
// Assembly
// ============================================================================

/// Mocks for one device, kept around so tests can steer and inspect them
#[derive(Clone)]
pub struct Harness {
    pub telemetry: Arc<MockTelemetry>,
    pub shell: Arc<MockShell>,
    pub probe: Arc<MockProbe>,
    pub tools: Arc<MockTools>,
}

impl Harness {
    /// Reachable device running the newest managed firmware
    pub fn current(address: &str) -> Self {
        let marker = format!("cat {}", settings().provisioning.version_marker_path);
        Self {
            telemetry: Arc::new(MockTelemetry::new()),
            shell: Arc::new(MockShell::new(address).reply(&marker, &format!("{NEWEST}\n"))),
            probe: Arc::new(MockProbe::new(true, true)),
            tools: Arc::new(MockTools::succeeding()),
        }
    }

    pub fn with_telemetry(mut self, telemetry: MockTelemetry) -> Self {
        self.telemetry = Arc::new(telemetry);
        self
    }

    pub fn with_shell(mut self, shell: MockShell) -> Self {
        self.shell = Arc::new(shell);
        self
    }

    pub fn with_probe(mut self, probe: MockProbe) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    pub fn with_tools(mut self, tools: MockTools) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    pub fn deps(&self) -> DeviceDeps {
        DeviceDeps {
            telemetry: self.telemetry.clone(),
            shell: self.shell.clone(),
            probe: self.probe.clone(),
            tools: self.tools.clone(),
        }
    }
}

pub fn settings() -> FleetSettings {
    let mut settings = FleetSettings::default();
    settings.provisioning.newest_version = NEWEST.to_string();
    settings
}

pub fn controller(
    address: &str,
    harness: &Harness,
    settings: FleetSettings,
) -> (Arc<DeviceController>, broadcast::Receiver<FleetEvent>) {
    let (event_tx, event_rx) = broadcast::channel(1024);
    let device = DeviceController::new(
        MinerConfig::new(address),
        harness.deps(),
        Arc::new(settings),
        event_tx,
    );
    (Arc::new(device), event_rx)
}

/// Drain state transitions seen so far as `(from, to)` pairs
pub fn transitions(rx: &mut broadcast::Receiver<FleetEvent>) -> Vec<(String, String)> {
    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let FleetEvent::DeviceStateChanged { from, to, .. } = event {
            seen.push((from, to));
        }
    }
    seen
}

/// Factory handing out pre-built harnesses by address
#[derive(Default)]
pub struct TestFactory {
    harnesses: Mutex<HashMap<String, Harness>>,
}

impl TestFactory {
    pub fn with(self, address: &str, harness: Harness) -> Self {
        self.harnesses
            .lock()
            .unwrap()
            .insert(address.to_string(), harness);
        self
    }
}

#[async_trait]
impl DeviceFactory for TestFactory {
    async fn create_deps(&self, config: &MinerConfig, _settings: &FleetSettings) -> DeviceDeps {
        let harness = self
            .harnesses
            .lock()
            .unwrap()
            .get(&config.address)
            .cloned()
            .unwrap_or_else(|| Harness::current(&config.address));
        harness.deps()
    }
}
