//! Cooperative pause gate
//!
//! A set gate lets the lifecycle task through; a cleared one blocks it at its
//! next checkpoint. Work already in flight is never interrupted.

use tokio::sync::watch;

/// Boolean gate with async wait
#[derive(Debug)]
pub struct PauseGate {
    open: watch::Sender<bool>,
}

impl PauseGate {
    /// New gate, set (not paused)
    #[must_use]
    pub fn new() -> Self {
        let (open, _) = watch::channel(true);
        Self { open }
    }

    /// Let waiters through
    pub fn set(&self) {
        self.open.send_replace(true);
    }

    /// Block waiters at their next `wait`
    pub fn clear(&self) {
        self.open.send_replace(false);
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        *self.open.borrow()
    }

    /// Return once the gate is set; immediately if it already is
    pub async fn wait(&self) {
        let mut rx = self.open.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_starts_set() {
        let gate = PauseGate::new();
        assert!(gate.is_set());
        gate.wait().await;
    }

    #[tokio::test]
    async fn test_clear_and_set() {
        let gate = PauseGate::new();
        gate.clear();
        assert!(!gate.is_set());
        gate.set();
        assert!(gate.is_set());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_blocks_until_set() {
        let gate = Arc::new(PauseGate::new());
        gate.clear();

        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.wait().await }
        });

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!waiter.is_finished());

        gate.set();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter released")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_clear_keeps_blocking() {
        let gate = Arc::new(PauseGate::new());
        gate.clear();

        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.wait().await }
        });
        tokio::task::yield_now().await;

        gate.clear();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!waiter.is_finished());

        gate.set();
        waiter.await.unwrap();
    }
}
