//! Remote shell trait

use std::path::Path;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;

/// Command channel to one appliance
///
/// Implementations own no long-lived session: every call authenticates,
/// does its work and disconnects.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run a command and collect its output
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError>;

    /// Copy a local file to `remote`, overwriting it
    async fn copy_file(&self, local: &Path, remote: &str) -> Result<(), ExecError>;

    /// Copy the contents of a local directory into `remote`
    ///
    /// Subdirectories are only descended into when `recursive` is set.
    async fn copy_dir(&self, local: &Path, remote: &str, recursive: bool)
    -> Result<(), ExecError>;

    /// Address of the appliance this channel talks to
    fn address(&self) -> &str;
}

/// Runs programs on the controlling host
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `program` with `args`; a non-zero exit is reported in the result,
    /// not as an error
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandResult, ExecError>;
}
