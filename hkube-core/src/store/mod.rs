//! Cluster persistence and the SSH key registry.
//!
//! The orchestrator saves the cluster after every phase through
//! [`ClusterStore`], so the last completed phase survives a failed run.
//! [`ConfigStore`] keeps everything in the JSON configuration file.

use crate::config::AppConfig;
use crate::error::{HkubeError, Result};
use crate::types::Cluster;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, instrument};

/// A registered SSH key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKey {
    /// Name, also used as the key name at the provider
    pub name: String,
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
}

/// Lookup of registered SSH keys.
pub trait SshKeyRegistry: Send + Sync {
    fn find_ssh_key(&self, name: &str) -> Option<SshKey>;
}

/// Durable storage of cluster snapshots.
pub trait ClusterStore: Send + Sync {
    /// Insert or replace the cluster with the same name.
    fn save_cluster(&self, cluster: &Cluster) -> Result<()>;

    fn load_cluster(&self, name: &str) -> Result<Option<Cluster>>;

    fn list_clusters(&self) -> Result<Vec<Cluster>>;
}

/// Store backed by the JSON configuration file.
pub struct ConfigStore {
    path: PathBuf,
    config: Mutex<AppConfig>,
}

impl ConfigStore {
    /// Open the store at `path`, loading existing contents.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = AppConfig::load_from(&path)?;
        Ok(Self { path, config: Mutex::new(config) })
    }

    /// Open the store at the default configuration path.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::paths::config_path())
    }

    /// Copy of the current configuration.
    pub fn config(&self) -> AppConfig {
        self.config.lock().clone()
    }

    /// Apply `f` to the configuration and write it back.
    pub fn update<T>(&self, f: impl FnOnce(&mut AppConfig) -> Result<T>) -> Result<T> {
        let mut config = self.config.lock();
        let value = f(&mut config)?;
        config.save_to(&self.path)?;
        Ok(value)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl SshKeyRegistry for ConfigStore {
    fn find_ssh_key(&self, name: &str) -> Option<SshKey> {
        self.config.lock().ssh_keys.iter().find(|k| k.name == name).cloned()
    }
}

impl ClusterStore for ConfigStore {
    #[instrument(skip(self, cluster), fields(cluster = %cluster.name, phase = %cluster.phase))]
    fn save_cluster(&self, cluster: &Cluster) -> Result<()> {
        self.update(|config| {
            config.upsert_cluster(cluster.clone());
            Ok(())
        })?;
        debug!(path = %self.path.display(), "Cluster saved");
        Ok(())
    }

    fn load_cluster(&self, name: &str) -> Result<Option<Cluster>> {
        Ok(self.config.lock().clusters.iter().find(|c| c.name == name).cloned())
    }

    fn list_clusters(&self) -> Result<Vec<Cluster>> {
        Ok(self.config.lock().clusters.clone())
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore").field("path", &self.path).finish()
    }
}

/// Resolve the private key for `name`, failing when it is not registered.
pub fn require_ssh_key(registry: &dyn SshKeyRegistry, name: &str) -> Result<SshKey> {
    registry.find_ssh_key(name).ok_or_else(|| HkubeError::SshKeyNotFound { name: name.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClusterPhase, Node, NodeRole};
    use std::net::Ipv4Addr;

    fn node(name: &str, role: NodeRole, ip: Ipv4Addr) -> Node {
        Node {
            name: name.to_string(),
            role,
            server_type: "cx11".to_string(),
            ip_address: Some(ip),
            ssh_key_name: "deploy".to_string(),
        }
    }

    #[test]
    fn test_cluster_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = ConfigStore::open(&path).unwrap();

        let cluster = Cluster::new("demo")
            .with_nodes([
                node("demo-master-01", NodeRole::Master, Ipv4Addr::new(10, 0, 0, 1)),
                node("demo-worker-01", NodeRole::Worker, Ipv4Addr::new(10, 0, 0, 2)),
            ])
            .with_phase(ClusterPhase::WorkersAllocated);
        store.save_cluster(&cluster).unwrap();

        let reopened = ConfigStore::open(&path).unwrap();
        let loaded = reopened.load_cluster("demo").unwrap().unwrap();
        assert_eq!(loaded, cluster);
        assert!(loaded.nodes[0].is_master());
        assert!(!loaded.nodes[1].is_master());
    }

    #[test]
    fn test_save_replaces_existing_cluster() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path().join("config.json")).unwrap();

        store.save_cluster(&Cluster::new("a")).unwrap();
        store.save_cluster(&Cluster::new("b")).unwrap();
        store.save_cluster(&Cluster::new("a").with_phase(ClusterPhase::Complete)).unwrap();

        let clusters = store.list_clusters().unwrap();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].name, "a");
        assert_eq!(clusters[0].phase, ClusterPhase::Complete);
    }

    #[test]
    fn test_ssh_key_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path().join("config.json")).unwrap();
        store
            .update(|config| {
                config.add_ssh_key(SshKey {
                    name: "deploy".to_string(),
                    private_key_path: "/keys/id".into(),
                    public_key_path: "/keys/id.pub".into(),
                });
                Ok(())
            })
            .unwrap();

        assert!(store.find_ssh_key("deploy").is_some());
        assert!(matches!(require_ssh_key(&store, "missing"), Err(HkubeError::SshKeyNotFound { .. })));
    }
}
