//! OpenSSH client transport.

use super::RemoteExecutor;
use crate::error::{HkubeError, Result};
use crate::store::{require_ssh_key, SshKeyRegistry};
use crate::types::Node;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Remote user for bootstrap commands.
const REMOTE_USER: &str = "root";

/// Executes commands by spawning `ssh` with the node's registered key.
#[derive(Clone)]
pub struct SshTransport {
    binary: PathBuf,
    keys: Arc<dyn SshKeyRegistry>,
    connect_timeout_secs: u32,
}

impl SshTransport {
    /// Create a transport resolving node keys through `keys`.
    pub fn new(keys: Arc<dyn SshKeyRegistry>) -> Self {
        Self { binary: PathBuf::from("ssh"), keys, connect_timeout_secs: 30 }
    }

    /// Use a specific `ssh` binary.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Build the argument list for running `command` on `node`.
    pub fn args(&self, node: &Node, command: &str) -> Result<Vec<String>> {
        let key = require_ssh_key(self.keys.as_ref(), &node.ssh_key_name)?;
        let ip = node.ip_address.ok_or_else(|| HkubeError::MissingAddress { name: node.name.clone() })?;

        Ok(vec![
            "-i".to_string(),
            key.private_key_path.to_string_lossy().to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            format!("{}@{}", REMOTE_USER, ip),
            command.to_string(),
        ])
    }
}

#[async_trait]
impl RemoteExecutor for SshTransport {
    #[instrument(skip(self, node, command), fields(node = %node.name))]
    async fn execute(&self, node: &Node, command: &str) -> Result<String> {
        let args = self.args(node, command)?;
        debug!(command, "Running remote command");

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timed-out caller drops this future; the ssh session must end with it.
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| HkubeError::Transport {
                node: node.name.clone(),
                reason: format!("failed to spawn {}: {}", self.binary.display(), e),
            })?;

        if !output.status.success() {
            return Err(HkubeError::CommandFailed {
                node: node.name.clone(),
                command: command.to_string(),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
