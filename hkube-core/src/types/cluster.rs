//! Cluster domain types.

use crate::error::{HkubeError, Result};
use crate::naming;
use crate::store::SshKeyRegistry;
use crate::types::node::{Node, NodeRole, NodeTemplate};
use serde::{Deserialize, Serialize};

/// Last completed step of cluster creation.
///
/// Phases only move forward; the persisted phase tells an operator where a
/// failed run stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterPhase {
    #[default]
    Empty,
    MastersAllocated,
    WorkersAllocated,
    PackagesProvisioned,
    MasterInstalled,
    WorkersInstalled,
    Complete,
}

impl ClusterPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::MastersAllocated => "masters_allocated",
            Self::WorkersAllocated => "workers_allocated",
            Self::PackagesProvisioned => "packages_provisioned",
            Self::MasterInstalled => "master_installed",
            Self::WorkersInstalled => "workers_installed",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cluster snapshot.
///
/// Orchestration phases consume a snapshot and return the next one, so each
/// phase can be exercised on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Cluster name, prefix of every server name
    pub name: String,

    /// Nodes in creation order (masters first)
    pub nodes: Vec<Node>,

    /// Last completed phase
    #[serde(default)]
    pub phase: ClusterPhase,

    /// Requested self-hosted control plane (recorded only)
    #[serde(default)]
    pub self_hosted: bool,

    /// Set when a node was freshly created and needs time to boot
    #[serde(skip)]
    pub needs_settle: bool,
}

impl Cluster {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            phase: ClusterPhase::Empty,
            self_hosted: false,
            needs_settle: false,
        }
    }

    /// The master node, if one has been allocated.
    pub fn master(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.is_master())
    }

    pub fn workers(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| !n.is_master())
    }

    pub fn count_role(&self, role: NodeRole) -> usize {
        self.nodes.iter().filter(|n| n.role == role).count()
    }

    /// Append nodes, skipping names already present (re-runs fetch existing servers).
    pub fn with_nodes(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        for node in nodes {
            if let Some(existing) = self.nodes.iter_mut().find(|n| n.name == node.name) {
                *existing = node;
            } else {
                self.nodes.push(node);
            }
        }
        self
    }

    pub fn with_phase(mut self, phase: ClusterPhase) -> Self {
        if phase > self.phase {
            self.phase = phase;
        }
        self
    }

    pub fn with_settle(mut self, needs_settle: bool) -> Self {
        self.needs_settle |= needs_settle;
        self
    }
}

/// A validated request to create a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSpec {
    /// Cluster name; a random one is generated when unset
    pub name: Option<String>,
    pub ssh_key: String,
    pub master_server_type: String,
    pub worker_server_type: String,
    /// Total node count, master included
    pub nodes: usize,
    pub self_hosted: bool,
}

impl ClusterSpec {
    /// Default number of nodes when `--nodes` is not given.
    pub const DEFAULT_NODES: usize = 2;

    /// Reject the request before any cloud resource is touched.
    pub fn validate(&self, keys: &dyn SshKeyRegistry) -> Result<()> {
        let required = [
            ("ssh-key", &self.ssh_key),
            ("master-server-type", &self.master_server_type),
            ("worker-server-type", &self.worker_server_type),
        ];
        for (flag, value) in required {
            if value.trim().is_empty() {
                return Err(HkubeError::Validation { reason: format!("flag --{} is required", flag) });
            }
        }

        if self.nodes == 0 {
            return Err(HkubeError::Validation { reason: "--nodes must be at least 1".to_string() });
        }

        if let Some(name) = &self.name {
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(HkubeError::Validation {
                    reason: format!("cluster name '{}' must be alphanumeric with dashes", name),
                });
            }
        }

        if keys.find_ssh_key(&self.ssh_key).is_none() {
            return Err(HkubeError::SshKeyNotFound { name: self.ssh_key.clone() });
        }

        Ok(())
    }

    /// The requested name, or a freshly generated one.
    pub fn resolve_name(&self) -> String {
        self.name.clone().unwrap_or_else(naming::random_name)
    }

    pub fn worker_count(&self) -> usize {
        self.nodes.saturating_sub(1)
    }

    pub fn master_template(&self) -> NodeTemplate {
        NodeTemplate::new(NodeRole::Master, &self.master_server_type, &self.ssh_key)
    }

    pub fn worker_template(&self) -> NodeTemplate {
        NodeTemplate::new(NodeRole::Worker, &self.worker_server_type, &self.ssh_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SshKey;
    use std::net::Ipv4Addr;
    use std::path::PathBuf;

    struct Keys(Vec<SshKey>);

    impl SshKeyRegistry for Keys {
        fn find_ssh_key(&self, name: &str) -> Option<SshKey> {
            self.0.iter().find(|k| k.name == name).cloned()
        }
    }

    fn keys() -> Keys {
        Keys(vec![SshKey {
            name: "deploy".to_string(),
            private_key_path: PathBuf::from("/keys/deploy"),
            public_key_path: PathBuf::from("/keys/deploy.pub"),
        }])
    }

    fn spec() -> ClusterSpec {
        ClusterSpec {
            name: Some("demo".to_string()),
            ssh_key: "deploy".to_string(),
            master_server_type: "cx21".to_string(),
            worker_server_type: "cx11".to_string(),
            nodes: 3,
            self_hosted: false,
        }
    }

    #[test]
    fn test_valid_spec_passes() {
        spec().validate(&keys()).unwrap();
    }

    #[test]
    fn test_missing_flags_are_rejected() {
        let mut s = spec();
        s.master_server_type = String::new();
        let err = s.validate(&keys()).unwrap_err();
        assert!(err.to_string().contains("--master-server-type"));

        let mut s = spec();
        s.ssh_key = "  ".to_string();
        assert!(matches!(s.validate(&keys()), Err(HkubeError::Validation { .. })));
    }

    #[test]
    fn test_unknown_ssh_key_is_rejected() {
        let mut s = spec();
        s.ssh_key = "other".to_string();
        assert!(matches!(s.validate(&keys()), Err(HkubeError::SshKeyNotFound { name }) if name == "other"));
    }

    #[test]
    fn test_zero_nodes_rejected() {
        let mut s = spec();
        s.nodes = 0;
        assert!(s.validate(&keys()).is_err());
    }

    #[test]
    fn test_with_nodes_replaces_by_name() {
        let node = |ip: Ipv4Addr| Node {
            name: "demo-master-01".to_string(),
            role: NodeRole::Master,
            server_type: "cx21".to_string(),
            ip_address: Some(ip),
            ssh_key_name: "deploy".to_string(),
        };
        let cluster = Cluster::new("demo")
            .with_nodes([node(Ipv4Addr::new(10, 0, 0, 1))])
            .with_nodes([node(Ipv4Addr::new(10, 0, 0, 2))]);
        assert_eq!(cluster.nodes.len(), 1);
        assert_eq!(cluster.nodes[0].ip_address, Some(Ipv4Addr::new(10, 0, 0, 2)));
    }

    #[test]
    fn test_phase_never_moves_backwards() {
        let cluster = Cluster::new("demo").with_phase(ClusterPhase::MasterInstalled);
        let cluster = cluster.with_phase(ClusterPhase::MastersAllocated);
        assert_eq!(cluster.phase, ClusterPhase::MasterInstalled);
    }

    #[test]
    fn test_settle_flag_not_persisted() {
        let cluster = Cluster::new("demo").with_settle(true);
        let json = serde_json::to_string(&cluster).unwrap();
        let back: Cluster = serde_json::from_str(&json).unwrap();
        assert!(!back.needs_settle);
        assert_eq!(back.name, "demo");
    }
}
