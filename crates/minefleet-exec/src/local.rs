//! Local process execution using `tokio::process`
//!
//! Vendor tools (the unlock utility, the stock installer) run on the
//! controlling host rather than on the appliance.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, instrument};

use crate::error::ExecError;
use crate::result::CommandResult;
use crate::traits::ToolRunner;

/// Runs programs on the controlling host and captures their output
#[derive(Debug, Clone)]
pub struct LocalRunner {
    /// Upper bound on a single tool invocation
    timeout: Duration,
}

impl LocalRunner {
    /// Create a new local runner
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30 * 60),
        }
    }

    /// Set per-invocation timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Internal method to spawn and wait
    #[instrument(skip(self), level = "debug")]
    async fn execute(&self, program: &str, args: &[String]) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecError::SpawnError(format!("{program}: {e}")))?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let duration = start.elapsed();

        let status = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        debug!(program, status, duration = ?duration, "local process exited");

        if !output.status.success() {
            error!(
                program,
                status,
                stderr = %stderr.trim(),
                "local process failed"
            );
        }

        Ok(CommandResult {
            status,
            stdout,
            stderr,
            duration,
        })
    }
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolRunner for LocalRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandResult, ExecError> {
        match timeout(self.timeout, self.execute(program, args)).await {
            Ok(result) => result,
            Err(_) => {
                error!(program, timeout = ?self.timeout, "local process timed out");
                Err(ExecError::Timeout {
                    timeout: self.timeout,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_run_success() {
        let runner = LocalRunner::new();
        let result = runner.run("echo", &args(&["10.0.0.5", "root"])).await.unwrap();

        assert!(result.success());
        assert_eq!(result.stdout.trim(), "10.0.0.5 root");
    }

    #[tokio::test]
    async fn test_run_failure_is_not_an_error() {
        let runner = LocalRunner::new();
        let result = runner
            .run("sh", &args(&["-c", "echo reset >&2; exit 3"]))
            .await
            .unwrap();

        assert!(!result.success());
        assert_eq!(result.status, 3);
        assert_eq!(result.stderr.trim(), "reset");
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = LocalRunner::new();
        let result = runner.run("/nonexistent/unlock-tool", &[]).await;

        assert!(matches!(result, Err(ExecError::SpawnError(_))));
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let runner = LocalRunner::new().with_timeout(Duration::from_millis(100));
        let result = runner.run("sleep", &args(&["5"])).await;

        assert!(matches!(result, Err(ExecError::Timeout { .. })));
    }
}
