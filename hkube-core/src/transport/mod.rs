//! Remote command execution.
//!
//! The bootstrap executor drives nodes through [`RemoteExecutor`]; the
//! transport decides how a command reaches the node. [`SshTransport`] shells
//! out to the system `ssh` client.

use crate::error::Result;
use crate::types::Node;
use async_trait::async_trait;

pub mod ssh;

pub use ssh::SshTransport;

/// Runs a command on a node and returns its captured standard output.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Execute `command` on `node`.
    ///
    /// A command that cannot be started or exits unsuccessfully is an error.
    async fn execute(&self, node: &Node, command: &str) -> Result<String>;
}
