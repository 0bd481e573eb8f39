//! Remote bootstrap execution.
//!
//! [`BootstrapExecutor`] runs ordered command lists on a node through the
//! transport and reports a progress event for every command that succeeds.
//! The first failure stops the list; nothing is retried here.

pub mod commands;

pub use commands::BootstrapPlan;

use crate::error::{HkubeError, Result};
use crate::observability::metrics;
use crate::progress::ProgressCoordinator;
use crate::transport::RemoteExecutor;
use crate::types::{Node, RemoteCommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Runs bootstrap commands against nodes.
#[derive(Clone)]
pub struct BootstrapExecutor {
    transport: Arc<dyn RemoteExecutor>,
    progress: Arc<dyn ProgressCoordinator>,
    command_timeout: Option<Duration>,
}

impl BootstrapExecutor {
    pub fn new(transport: Arc<dyn RemoteExecutor>, progress: Arc<dyn ProgressCoordinator>) -> Self {
        Self { transport, progress, command_timeout: None }
    }

    /// Fail commands that run longer than `timeout`.
    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Run `commands` in order, emitting each label after its command succeeds.
    #[instrument(skip(self, node, commands), fields(node = %node.name, count = commands.len()))]
    pub async fn run(&self, node: &Node, commands: &[RemoteCommand]) -> Result<()> {
        for command in commands {
            self.execute(node, &command.command).await?;
            self.progress.emit(&node.name, &command.label)?;
        }
        Ok(())
    }

    /// Run `commands` in order without reporting progress.
    pub async fn run_quiet(&self, node: &Node, commands: &[RemoteCommand]) -> Result<()> {
        for command in commands {
            self.execute(node, &command.command).await?;
        }
        Ok(())
    }

    /// Run one command and return its captured output.
    #[instrument(skip(self, node, command), fields(node = %node.name))]
    pub async fn run_single(&self, node: &Node, command: &str) -> Result<String> {
        self.execute(node, command).await
    }

    async fn execute(&self, node: &Node, command: &str) -> Result<String> {
        debug!(node = %node.name, command, "Executing");
        let result = match self.command_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.transport.execute(node, command))
                .await
                .unwrap_or_else(|_| {
                    Err(HkubeError::Timeout { operation: format!("'{}' on {}", command, node.name), timeout })
                }),
            None => self.transport.execute(node, command).await,
        };

        metrics::record_remote_command(result.is_ok());
        if let Err(e) = &result {
            warn!(node = %node.name, error = %e, "Remote command failed");
        }
        result
    }
}
