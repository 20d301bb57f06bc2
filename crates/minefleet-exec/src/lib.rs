//! minefleet-exec: Remote execution abstraction
//!
//! Provides the remote-shell channel used to provision appliances over SSH,
//! local subprocess execution for vendor tools, and the bounded-retry
//! combinator shared by every network path that retries.

pub mod error;
pub mod local;
pub mod result;
pub mod retry;
pub mod ssh;
pub mod traits;

pub use error::ExecError;
pub use local::LocalRunner;
pub use result::{CommandResult, ConnectionInfo};
pub use retry::{RetryPolicy, retry, retry_if, run_with_retry};
pub use ssh::{SshShell, shell_quote};
pub use traits::{RemoteShell, ToolRunner};
