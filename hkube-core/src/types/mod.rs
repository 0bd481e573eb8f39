//! Core domain types for hkube.

pub mod cluster;
pub mod command;
pub mod node;

// Re-exports
pub use cluster::{Cluster, ClusterPhase, ClusterSpec};
pub use command::RemoteCommand;
pub use node::{Node, NodeRole, NodeTemplate};
