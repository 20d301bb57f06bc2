//! Bounded retry combinator

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::result::CommandResult;
use crate::traits::RemoteShell;

/// How many times an operation is attempted and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    /// Pause between a failed attempt and the next one
    pub delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Retry without waiting between attempts
    #[must_use]
    pub const fn immediate(attempts: u32) -> Self {
        Self::new(attempts, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::immediate(3)
    }
}

/// Run `op` until it succeeds, fails with an error `should_retry` rejects, or
/// the policy's attempts are used up. The last error is returned.
///
/// `op` receives the 1-based attempt number.
///
/// # Errors
/// Returns the error of the final attempt.
pub async fn retry_if<T, E, F, Fut, P>(
    policy: RetryPolicy,
    should_retry: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && should_retry(&e) => {
                warn!(attempt, attempts, error = %e, "attempt failed, retrying");
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// [`retry_if`] that retries every error
///
/// # Errors
/// Returns the error of the final attempt.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_if(policy, |_| true, op).await
}

/// Run a remote command under `policy`, swallowing failures
///
/// Returns `None` once every attempt has failed; the failure is logged here
/// and never reaches the caller.
pub async fn run_with_retry(
    shell: &dyn RemoteShell,
    cmd: &str,
    policy: RetryPolicy,
) -> Option<CommandResult> {
    match retry(policy, |_| shell.run(cmd)).await {
        Ok(result) => {
            if !result.success() {
                warn!(
                    host = %shell.address(),
                    command = %cmd,
                    status = result.status,
                    stderr = %result.stderr.trim(),
                    "remote command exited non-zero"
                );
            }
            Some(result)
        }
        Err(e) => {
            error!(
                host = %shell.address(),
                command = %cmd,
                attempts = policy.attempts,
                error = %e,
                "remote command failed after retries"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::ExecError;

    struct FailingShell {
        calls: AtomicU32,
    }

    #[async_trait]
    impl RemoteShell for FailingShell {
        async fn run(&self, _cmd: &str) -> Result<CommandResult, ExecError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ExecError::ConnectionFailed("connection reset".to_string()))
        }

        async fn copy_file(&self, _local: &Path, _remote: &str) -> Result<(), ExecError> {
            unreachable!()
        }

        async fn copy_dir(
            &self,
            _local: &Path,
            _remote: &str,
            _recursive: bool,
        ) -> Result<(), ExecError> {
            unreachable!()
        }

        fn address(&self) -> &str {
            "10.0.0.9"
        }
    }

    #[tokio::test]
    async fn test_retry_stops_on_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<u32, String> = retry(RetryPolicy::immediate(3), |attempt| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err("not yet".to_string())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_if_stops_on_rejected_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), String> = retry_if(
            RetryPolicy::immediate(4),
            |e: &String| e == "refused",
            |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err("timeout".to_string()) }
            },
        )
        .await;

        assert_eq!(result, Err("timeout".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausts_attempts_with_delay() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let started = tokio::time::Instant::now();

        let result: Result<(), String> = retry(
            RetryPolicy::new(4, Duration::from_secs(1)),
            |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err("refused".to_string()) }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_run_with_retry_swallows_failure_after_three_attempts() {
        let shell = FailingShell {
            calls: AtomicU32::new(0),
        };

        let result = run_with_retry(&shell, "cat /etc/bos_version", RetryPolicy::default()).await;

        assert!(result.is_none());
        assert_eq!(shell.calls.load(Ordering::SeqCst), 3);
    }
}
