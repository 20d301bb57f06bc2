//! SSH remote shell using russh crate
//!
//! Appliances ship with fixed default credentials and regenerate host keys on
//! every reflash, so host keys are accepted without verification. This is only
//! acceptable on a private provisioning network.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::keys::ssh_key;
use russh::{ChannelMsg, Disconnect, client};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::error::ExecError;
use crate::result::{CommandResult, ConnectionInfo};
use crate::traits::RemoteShell;

/// Quote `value` for a POSIX shell
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Accept all server keys (like StrictHostKeyChecking=no)
        Ok(true)
    }
}

/// One authenticated session, dropped at the end of the operation that
/// opened it
struct SshSession {
    handle: client::Handle<SshClientHandler>,
    host: String,
}

impl SshSession {
    /// Execute `cmd`, optionally feeding `input` to its stdin
    async fn exec(&self, cmd: &str, input: Option<&[u8]>) -> Result<CommandResult, ExecError> {
        debug!(host = %self.host, command = %cmd, "executing remote command");

        let start = Instant::now();

        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| ExecError::Channel(e.to_string()))?;

        channel
            .exec(true, cmd)
            .await
            .map_err(|e| ExecError::Channel(e.to_string()))?;

        if let Some(data) = input {
            channel
                .data(data)
                .await
                .map_err(|e| ExecError::Channel(e.to_string()))?;
            channel
                .eof()
                .await
                .map_err(|e| ExecError::Channel(e.to_string()))?;
        }

        let mut status = -1;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        // Exit status may arrive after EOF, so drain until the channel closes
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => {
                    stdout.extend_from_slice(&data);
                }
                ChannelMsg::ExtendedData { data, ext } => {
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    status = exit_status.cast_signed();
                }
                _ => {}
            }
        }

        let duration = start.elapsed();
        let stdout = String::from_utf8_lossy(&stdout).to_string();
        let stderr = String::from_utf8_lossy(&stderr).to_string();

        debug!(
            host = %self.host,
            command = %cmd,
            status = status,
            duration = ?duration,
            "remote command completed"
        );

        Ok(CommandResult {
            status,
            stdout,
            stderr,
            duration,
        })
    }

    /// Like `exec`, but a non-zero exit becomes `ExecError::CommandFailed`
    async fn exec_checked(&self, cmd: &str, input: Option<&[u8]>) -> Result<(), ExecError> {
        let result = self.exec(cmd, input).await?;
        if result.success() {
            Ok(())
        } else {
            Err(ExecError::CommandFailed {
                status: result.status,
                stderr: result.stderr,
            })
        }
    }

    /// Write `data` to `remote` through `cat`
    async fn upload(&self, data: &[u8], remote: &str) -> Result<(), ExecError> {
        let cmd = format!("cat > {}", shell_quote(remote));
        self.exec_checked(&cmd, Some(data)).await
    }

    async fn close(self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            warn!(host = %self.host, error = %e, "SSH disconnect failed");
        }
    }
}

async fn read_local(path: &Path) -> Result<Vec<u8>, ExecError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| ExecError::LocalFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}

/// SSH remote shell
///
/// Holds connection details only. Each operation opens a fresh session and
/// closes it before returning, so a long pause never leaves a stale session
/// behind.
#[derive(Debug, Clone)]
pub struct SshShell {
    /// Connection configuration
    conn_info: ConnectionInfo,
    /// Upper bound on TCP connect plus handshake
    connect_timeout: Duration,
}

impl SshShell {
    /// Create a new SSH shell
    #[must_use]
    pub fn new(conn_info: ConnectionInfo) -> Self {
        Self {
            conn_info,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Connect and authenticate with the appliance's password
    #[instrument(skip(self), fields(host = %self.conn_info.host))]
    async fn open(&self) -> Result<SshSession, ExecError> {
        debug!(
            host = %self.conn_info.host,
            port = self.conn_info.port,
            user = %self.conn_info.user,
            "connecting to SSH"
        );

        let config = client::Config {
            inactivity_timeout: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        let config = Arc::new(config);

        let connect = client::connect(
            config,
            (&self.conn_info.host[..], self.conn_info.port),
            SshClientHandler,
        );

        let mut handle = timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| ExecError::Timeout {
                timeout: self.connect_timeout,
            })?
            .map_err(|e| ExecError::ConnectionFailed(e.to_string()))?;

        let auth_res = handle
            .authenticate_password(&self.conn_info.user, &self.conn_info.password)
            .await
            .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?;

        if !auth_res.success() {
            return Err(ExecError::AuthenticationFailed(
                "password authentication rejected".to_string(),
            ));
        }

        debug!(host = %self.conn_info.host, "SSH connected and authenticated");

        Ok(SshSession {
            handle,
            host: self.conn_info.host.clone(),
        })
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    #[instrument(skip(self), fields(host = %self.conn_info.host))]
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        let session = self.open().await?;
        let result = session.exec(cmd, None).await;
        session.close().await;
        result
    }

    #[instrument(skip(self), fields(host = %self.conn_info.host))]
    async fn copy_file(&self, local: &Path, remote: &str) -> Result<(), ExecError> {
        let data = read_local(local).await?;

        let session = self.open().await?;
        let result = session.upload(&data, remote).await;
        session.close().await;

        if result.is_ok() {
            info!(
                host = %self.conn_info.host,
                local = %local.display(),
                remote = %remote,
                bytes = data.len(),
                "copied file"
            );
        }
        result
    }

    #[instrument(skip(self), fields(host = %self.conn_info.host))]
    async fn copy_dir(
        &self,
        local: &Path,
        remote: &str,
        recursive: bool,
    ) -> Result<(), ExecError> {
        let session = self.open().await?;
        let result = copy_tree(&session, local, remote, recursive).await;
        session.close().await;

        match &result {
            Ok(files) => info!(
                host = %self.conn_info.host,
                local = %local.display(),
                remote = %remote,
                files,
                "copied directory"
            ),
            Err(e) => warn!(host = %self.conn_info.host, error = %e, "directory copy failed"),
        }
        result.map(|_| ())
    }

    fn address(&self) -> &str {
        &self.conn_info.host
    }
}

/// Walk `local` breadth-first, mirroring it under `remote` over one session
async fn copy_tree(
    session: &SshSession,
    local: &Path,
    remote: &str,
    recursive: bool,
) -> Result<usize, ExecError> {
    let io_err = |path: &Path, e: std::io::Error| ExecError::LocalFile {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let mut pending: VecDeque<(PathBuf, String)> = VecDeque::new();
    pending.push_back((local.to_path_buf(), remote.trim_end_matches('/').to_string()));
    let mut files = 0;

    while let Some((dir, target)) = pending.pop_front() {
        session
            .exec_checked(&format!("mkdir -p {}", shell_quote(&target)), None)
            .await?;

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| io_err(&dir, e))?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(&dir, e))? {
            let path = entry.path();
            let dest = format!("{target}/{}", entry.file_name().to_string_lossy());
            let file_type = entry.file_type().await.map_err(|e| io_err(&path, e))?;

            if file_type.is_dir() {
                if recursive {
                    pending.push_back((path, dest));
                }
            } else {
                let data = read_local(&path).await?;
                session.upload(&data, &dest).await?;
                files += 1;
            }
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote_plain() {
        assert_eq!(shell_quote("/tmp/bos_upgrade"), "'/tmp/bos_upgrade'");
    }

    #[test]
    fn test_shell_quote_embedded_quote() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[tokio::test]
    async fn test_copy_file_missing_local_fails_before_connecting() {
        // Port 9 on a TEST-NET address: reaching the network would time out,
        // so an immediate LocalFile error proves the read happens first.
        let shell = SshShell::new(ConnectionInfo::new("192.0.2.1", "root", "admin").with_port(9))
            .with_connect_timeout(Duration::from_secs(30));

        let result = shell
            .copy_file(Path::new("/nonexistent/update.tar"), "/tmp/update.tar")
            .await;

        assert!(matches!(result, Err(ExecError::LocalFile { .. })));
    }

    #[tokio::test]
    #[ignore = "requires SSH server"]
    async fn test_ssh_run_against_appliance() {
        let host = std::env::var("MINEFLEET_TEST_HOST").unwrap_or_else(|_| "127.0.0.1".into());
        let shell = SshShell::new(ConnectionInfo::new(host, "root", "admin"));

        let result = shell.run("echo ok").await.unwrap();
        assert_eq!(result.stdout.trim(), "ok");
    }
}
