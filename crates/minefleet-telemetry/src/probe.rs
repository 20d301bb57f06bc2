//! Port reachability checks
//!
//! Liveness is judged by whether a TCP connect to a well-known port succeeds:
//! the web UI port tells whether the appliance is up at all, the SSH port
//! whether it can be provisioned without unlocking first.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// Answers "is this port accepting connections right now"
#[async_trait]
pub trait PortProbe: Send + Sync {
    async fn is_open(&self, address: &str, port: u16) -> bool;
}

/// Probe that opens and immediately drops a TCP connection
#[derive(Debug, Clone)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl PortProbe for TcpProbe {
    async fn is_open(&self, address: &str, port: u16) -> bool {
        let open = matches!(
            timeout(self.timeout, TcpStream::connect((address, port))).await,
            Ok(Ok(_))
        );
        trace!(address, port, open, "probed port");
        open
    }
}
