//! Error types for hkube.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use crate::types::{ClusterPhase, Node};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for hkube operations.
pub type Result<T> = std::result::Result<T, HkubeError>;

/// Main error type for hkube.
#[derive(Error, Debug)]
pub enum HkubeError {
    // Validation errors
    #[error("Invalid cluster request: {reason}")]
    Validation { reason: String },

    #[error("SSH key '{name}' not found")]
    SshKeyNotFound { name: String },

    // Cloud errors
    #[error("Server already exists: {name}")]
    ServerConflict { name: String },

    #[error("Server not found: {name}")]
    ServerNotFound { name: String },

    #[error("Server {name} has no public IPv4 address")]
    MissingAddress { name: String },

    #[error("Failed to allocate node {node}: {source}")]
    AllocationFailed {
        node: String,
        /// Nodes allocated earlier in the same batch; kept by the caller.
        allocated: Vec<Node>,
        #[source]
        source: Box<HkubeError>,
    },

    #[error("Cloud action {action_id} failed: {reason}")]
    ActionFailed { action_id: u64, reason: String },

    #[error("Cloud API error ({status}, {code}): {message}")]
    Cloud { status: u16, code: String, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    // Remote execution errors
    #[error("Command '{command}' failed on {node} (exit code {exit_code:?}): {stderr}")]
    CommandFailed { node: String, command: String, exit_code: Option<i32>, stderr: String },

    #[error("Transport error on {node}: {reason}")]
    Transport { node: String, reason: String },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    // Orchestration errors
    #[error("Cluster {cluster} has no master node")]
    NoMaster { cluster: String },

    #[error("No progress registered for node {node}")]
    UnknownProgressNode { node: String },

    #[error("Progress already registered for node {node}")]
    ProgressAlreadyRegistered { node: String },

    #[error("Phase {phase} failed: {source}")]
    PhaseFailed {
        phase: ClusterPhase,
        #[source]
        source: Box<HkubeError>,
    },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HkubeError {
    /// Create an Internal error from any error type.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(err.to_string())
    }

    /// Wrap this error as the failure of `phase`.
    pub fn in_phase(self, phase: ClusterPhase) -> Self {
        Self::PhaseFailed { phase, source: Box::new(self) }
    }

    /// Whether the cloud rejected a create because the name is taken.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ServerConflict { .. })
    }
}
