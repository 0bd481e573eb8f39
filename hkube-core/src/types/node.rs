//! Node domain types.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Role a node plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Control-plane node
    Master,

    /// Pool node that joins the master
    Worker,
}

impl NodeRole {
    /// Name segment used in generated server names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Worker => "worker",
        }
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One allocated machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Server name, unique within the cluster (e.g. `prod-worker-02`)
    pub name: String,

    /// Master or worker
    pub role: NodeRole,

    /// Provider server type (e.g. `cx11`)
    pub server_type: String,

    /// Public IPv4 address
    pub ip_address: Option<Ipv4Addr>,

    /// Name of the registered SSH key used to reach the node
    pub ssh_key_name: String,
}

impl Node {
    pub fn is_master(&self) -> bool {
        self.role == NodeRole::Master
    }

    /// Deterministic server name: `<cluster>-<role>-<NN>`, 1-based and zero-padded.
    pub fn server_name(cluster: &str, role: NodeRole, index: usize) -> String {
        format!("{}-{}-{:02}", cluster, role, index)
    }
}

/// Shape shared by every node allocated in one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTemplate {
    pub role: NodeRole,
    pub server_type: String,
    pub ssh_key_name: String,
}

impl NodeTemplate {
    pub fn new(role: NodeRole, server_type: impl Into<String>, ssh_key_name: impl Into<String>) -> Self {
        Self { role, server_type: server_type.into(), ssh_key_name: ssh_key_name.into() }
    }
}
