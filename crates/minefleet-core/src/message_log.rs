//! Operator-facing message log

use std::collections::VecDeque;

use tokio::sync::RwLock;

/// Bounded text log, most recent line first
#[derive(Debug)]
pub struct MessageLog {
    lines: RwLock<VecDeque<String>>,
    capacity: usize,
}

impl MessageLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Prepend a line, dropping the oldest one when full
    pub async fn push(&self, line: impl Into<String>) {
        let mut lines = self.lines.write().await;
        lines.push_front(line.into());
        lines.truncate(self.capacity);
    }

    /// Copy of the log, most recent first
    pub async fn lines(&self) -> Vec<String> {
        self.lines.read().await.iter().cloned().collect()
    }
}
