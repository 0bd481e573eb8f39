//! Test doubles shared by the integration tests.
//!
//! None of these touch the network: the cloud, the SSH transport and the
//! config file are all replaced by in-memory versions that record calls.

#![allow(dead_code)]

use async_trait::async_trait;
use hkube_core::bootstrap::commands::JOIN_TOKEN_COMMAND;
use hkube_core::{
    ActionRef, CloudProvider, Cluster, ClusterOrchestrator, ClusterSpec, ClusterStore, Collaborators,
    HkubeError, Node, PipelineConfig, ProgressTracker, RemoteExecutor, Result, Server, ServerCreateRequest,
    ServerCreated,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const JOIN_OUTPUT: &str =
    "kubeadm join 10.0.0.1:6443 --token abcdef.0123456789abcdef --discovery-token-ca-cert-hash sha256:1f2e\n";

/// In-memory cloud. Server names are unique like at the real provider.
#[derive(Default)]
pub struct MockCloud {
    servers: Mutex<HashMap<String, Server>>,
    next_id: AtomicU64,
    pub create_calls: Mutex<Vec<String>>,
    pub created: Mutex<Vec<String>>,
    pub awaited: Mutex<Vec<u64>>,
    fail_names: Mutex<HashSet<String>>,
}

impl MockCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `name` already exists at the provider.
    pub fn with_existing(self, name: &str) -> Self {
        let server = self.make_server(name);
        self.servers.lock().insert(name.to_string(), server);
        self
    }

    /// Make creation of `name` fail with a non-conflict error.
    pub fn fail_create(&self, name: &str) {
        self.fail_names.lock().insert(name.to_string());
    }

    pub fn server_count(&self) -> usize {
        self.servers.lock().len()
    }

    fn make_server(&self, name: &str) -> Server {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Server { id, name: name.to_string(), public_ipv4: Some(Ipv4Addr::new(10, 0, 0, id as u8)) }
    }
}

#[async_trait]
impl CloudProvider for MockCloud {
    async fn create_server(&self, request: &ServerCreateRequest) -> Result<ServerCreated> {
        self.create_calls.lock().push(request.name.clone());

        if self.fail_names.lock().contains(&request.name) {
            return Err(HkubeError::Cloud {
                status: 422,
                code: "resource_limit_exceeded".to_string(),
                message: "server limit reached".to_string(),
            });
        }

        let mut servers = self.servers.lock();
        if servers.contains_key(&request.name) {
            return Err(HkubeError::ServerConflict { name: request.name.clone() });
        }

        let server = self.make_server(&request.name);
        servers.insert(request.name.clone(), server.clone());
        self.created.lock().push(request.name.clone());
        Ok(ServerCreated { action: ActionRef { id: 1000 + server.id }, server })
    }

    async fn get_server_by_name(&self, name: &str) -> Result<Server> {
        self.servers.lock().get(name).cloned().ok_or_else(|| HkubeError::ServerNotFound { name: name.to_string() })
    }

    async fn await_action(&self, action: &ActionRef) -> Result<()> {
        self.awaited.lock().push(action.id);
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct FailureRule {
    node: String,
    pattern: String,
    /// Remaining failures; `None` fails forever
    remaining: Option<usize>,
}

/// Records every command and fails the ones matching a rule.
pub struct MockTransport {
    pub ran: Mutex<Vec<(String, String)>>,
    rules: Mutex<Vec<FailureRule>>,
    join_output: String,
}

impl MockTransport {
    pub fn new() -> Self {
        Self { ran: Mutex::new(Vec::new()), rules: Mutex::new(Vec::new()), join_output: JOIN_OUTPUT.to_string() }
    }

    /// Fail commands on `node` containing `pattern`, `times` times (forever when `None`).
    pub fn fail(&self, node: &str, pattern: &str, times: Option<usize>) {
        self.rules.lock().push(FailureRule { node: node.to_string(), pattern: pattern.to_string(), remaining: times });
    }

    /// Commands run on `node`, in order.
    pub fn commands_for(&self, node: &str) -> Vec<String> {
        self.ran.lock().iter().filter(|(n, _)| n == node).map(|(_, c)| c.clone()).collect()
    }

    pub fn count_matching(&self, pattern: &str) -> usize {
        self.ran.lock().iter().filter(|(_, c)| c.contains(pattern)).count()
    }

    pub fn nodes_touched(&self) -> HashSet<String> {
        self.ran.lock().iter().map(|(n, _)| n.clone()).collect()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteExecutor for MockTransport {
    async fn execute(&self, node: &Node, command: &str) -> Result<String> {
        self.ran.lock().push((node.name.clone(), command.to_string()));

        let mut rules = self.rules.lock();
        for rule in rules.iter_mut() {
            if rule.node == node.name && command.contains(&rule.pattern) {
                let fire = match rule.remaining.as_mut() {
                    None => true,
                    Some(0) => false,
                    Some(n) => {
                        *n -= 1;
                        true
                    }
                };
                if fire {
                    return Err(HkubeError::CommandFailed {
                        node: node.name.clone(),
                        command: command.to_string(),
                        exit_code: Some(1),
                        stderr: "mock failure".to_string(),
                    });
                }
            }
        }

        if command == JOIN_TOKEN_COMMAND {
            return Ok(self.join_output.clone());
        }
        Ok(String::new())
    }
}

/// Keeps every saved snapshot, in order.
#[derive(Default)]
pub struct MemoryStore {
    pub saves: Mutex<Vec<Cluster>>,
}

impl MemoryStore {
    pub fn last(&self) -> Option<Cluster> {
        self.saves.lock().last().cloned()
    }
}

impl ClusterStore for MemoryStore {
    fn save_cluster(&self, cluster: &Cluster) -> Result<()> {
        self.saves.lock().push(cluster.clone());
        Ok(())
    }

    fn load_cluster(&self, name: &str) -> Result<Option<Cluster>> {
        Ok(self.saves.lock().iter().rev().find(|c| c.name == name).cloned())
    }

    fn list_clusters(&self) -> Result<Vec<Cluster>> {
        let mut latest: Vec<Cluster> = Vec::new();
        for cluster in self.saves.lock().iter() {
            latest.retain(|c| c.name != cluster.name);
            latest.push(cluster.clone());
        }
        Ok(latest)
    }
}

/// Everything a pipeline test needs, wired together.
pub struct Harness {
    pub cloud: Arc<MockCloud>,
    pub transport: Arc<MockTransport>,
    pub store: Arc<MemoryStore>,
    pub progress: Arc<ProgressTracker>,
    pub orchestrator: ClusterOrchestrator,
}

impl Harness {
    pub fn new(cloud: MockCloud, transport: MockTransport) -> Self {
        Self::with_config(cloud, transport, test_config())
    }

    pub fn with_config(cloud: MockCloud, transport: MockTransport, config: PipelineConfig) -> Self {
        let cloud = Arc::new(cloud);
        let transport = Arc::new(transport);
        let store = Arc::new(MemoryStore::default());
        let progress = Arc::new(ProgressTracker::new());

        let collaborators = Collaborators {
            cloud: cloud.clone(),
            transport: transport.clone(),
            store: store.clone(),
            progress: progress.clone(),
        };
        let orchestrator = ClusterOrchestrator::new(collaborators, config, "provider-token");

        Self { cloud, transport, store, progress, orchestrator }
    }
}

/// Pipeline settings without the boot pause.
pub fn test_config() -> PipelineConfig {
    PipelineConfig { settle_delay_secs: 0, ..PipelineConfig::default() }
}

pub fn spec(name: &str, nodes: usize) -> ClusterSpec {
    ClusterSpec {
        name: Some(name.to_string()),
        ssh_key: "deploy".to_string(),
        master_server_type: "cx21".to_string(),
        worker_server_type: "cx11".to_string(),
        nodes,
        self_hosted: false,
    }
}
