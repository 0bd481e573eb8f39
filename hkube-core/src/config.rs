//! Configuration management.

use crate::error::{HkubeError, Result};
use crate::store::SshKey;
use crate::types::Cluster;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default base image for every node.
pub const DEFAULT_IMAGE: &str = "ubuntu-16.04";

/// Default script installing docker and kubeadm on a node.
pub const DEFAULT_PACKAGE_SCRIPT_URL: &str =
    "https://raw.githubusercontent.com/xetys/hetzner-kube/master/install-docker-kubeadm.sh";

/// Default pod network CIDR (flannel).
pub const DEFAULT_POD_NETWORK_CIDR: &str = "10.244.0.0/16";

/// Tuning for the cluster creation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pause after freshly creating servers, before the first remote command
    pub settle_delay_secs: u64,
    /// Extra attempts for the package provisioning phase
    pub provision_retries: u32,
    /// Base image passed to the provider
    pub image: String,
    /// Script piped into bash on every node
    pub package_script_url: String,
    /// `--pod-network-cidr` for `kubeadm init`
    pub pod_network_cidr: String,
    /// Provision packages on all nodes at once instead of one by one
    pub concurrent_provisioning: bool,
    /// Upper bound for a single remote command (unset waits forever)
    pub command_timeout_secs: Option<u64>,
    /// Upper bound for a provider action (unset waits forever)
    pub action_timeout_secs: Option<u64>,
    /// Interval between provider action polls
    pub action_poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            settle_delay_secs: 30,
            provision_retries: 3,
            image: DEFAULT_IMAGE.to_string(),
            package_script_url: DEFAULT_PACKAGE_SCRIPT_URL.to_string(),
            pod_network_cidr: DEFAULT_POD_NETWORK_CIDR.to_string(),
            concurrent_provisioning: false,
            command_timeout_secs: None,
            action_timeout_secs: None,
            action_poll_interval_ms: 1000,
        }
    }
}

impl PipelineConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    pub fn action_timeout(&self) -> Option<Duration> {
        self.action_timeout_secs.map(Duration::from_secs)
    }

    pub fn action_poll_interval(&self) -> Duration {
        Duration::from_millis(self.action_poll_interval_ms)
    }
}

/// Provider credentials for one account/project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderContext {
    pub name: String,
    pub token: String,
}

/// Everything persisted in `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub current_context: Option<String>,
    pub contexts: Vec<ProviderContext>,
    pub ssh_keys: Vec<SshKey>,
    pub clusters: Vec<Cluster>,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Load configuration from `path`, falling back to defaults when absent.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| HkubeError::Io { path: path.to_path_buf(), source: e })?;
        serde_json::from_str(&content).map_err(|e| HkubeError::InvalidConfig {
            reason: format!("Failed to parse config {}: {}", path.display(), e),
        })
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| HkubeError::Io { path: parent.to_path_buf(), source: e })?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| HkubeError::InvalidConfig {
            reason: format!("Failed to serialize config: {}", e),
        })?;
        std::fs::write(path, content).map_err(|e| HkubeError::Io { path: path.to_path_buf(), source: e })
    }

    /// The active provider context.
    pub fn current_context(&self) -> Option<&ProviderContext> {
        let name = self.current_context.as_deref()?;
        self.contexts.iter().find(|c| c.name == name)
    }

    /// Add or replace a context and make it current.
    pub fn add_context(&mut self, context: ProviderContext) {
        self.current_context = Some(context.name.clone());
        self.contexts.retain(|c| c.name != context.name);
        self.contexts.push(context);
    }

    /// Switch the current context.
    pub fn use_context(&mut self, name: &str) -> Result<()> {
        if !self.contexts.iter().any(|c| c.name == name) {
            return Err(HkubeError::InvalidConfig { reason: format!("context '{}' not found", name) });
        }
        self.current_context = Some(name.to_string());
        Ok(())
    }

    /// Add or replace an SSH key by name.
    pub fn add_ssh_key(&mut self, key: SshKey) {
        match self.ssh_keys.iter_mut().find(|k| k.name == key.name) {
            Some(existing) => *existing = key,
            None => self.ssh_keys.push(key),
        }
    }

    /// Add or replace a cluster by name, keeping its position.
    pub fn upsert_cluster(&mut self, cluster: Cluster) {
        match self.clusters.iter_mut().find(|c| c.name == cluster.name) {
            Some(existing) => *existing = cluster,
            None => self.clusters.push(cluster),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClusterPhase;
    use std::path::PathBuf;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.pipeline.settle_delay(), Duration::from_secs(30));
        assert_eq!(config.pipeline.provision_retries, 3);
    }

    #[test]
    fn test_partial_pipeline_section_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"pipeline": {"settle_delay_secs": 5}}"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.pipeline.settle_delay_secs, 5);
        assert_eq!(config.pipeline.image, DEFAULT_IMAGE);
        assert!(config.pipeline.command_timeout().is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.add_context(ProviderContext { name: "prod".to_string(), token: "secret".to_string() });
        config.add_ssh_key(SshKey {
            name: "deploy".to_string(),
            private_key_path: PathBuf::from("/keys/id"),
            public_key_path: PathBuf::from("/keys/id.pub"),
        });
        config.upsert_cluster(Cluster::new("demo").with_phase(ClusterPhase::MastersAllocated));
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.current_context().map(|c| c.token.as_str()), Some("secret"));
    }

    #[test]
    fn test_use_unknown_context_fails() {
        let mut config = AppConfig::default();
        assert!(config.use_context("nope").is_err());
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(HkubeError::InvalidConfig { .. })));
    }
}
