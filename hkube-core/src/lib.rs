//! hkube Core Library
//!
//! Provisions Kubernetes clusters on a cloud provider: allocates one master
//! and a pool of workers, bootstraps them over SSH (packages, `kubeadm init`,
//! worker join) and reports per-node progress while doing so.
//!
//! The pipeline lives in [`orchestrator`]; cloud, transport, persistence and
//! progress rendering are traits so they can be substituted in tests.

pub mod bootstrap;
pub mod cloud;
pub mod config;
pub mod error;
pub mod naming;
pub mod observability;
pub mod orchestrator;
pub mod paths;
pub mod progress;
pub mod provision;
pub mod store;
pub mod transport;
pub mod types;

// Re-export commonly used items
pub use bootstrap::{BootstrapExecutor, BootstrapPlan};
pub use cloud::{ActionRef, CloudProvider, HcloudClient, Server, ServerCreateRequest, ServerCreated};
pub use config::{AppConfig, PipelineConfig, ProviderContext};
pub use error::{HkubeError, Result};
pub use observability::init as init_observability;
pub use orchestrator::{ClusterOrchestrator, Collaborators};
pub use progress::{ProgressCoordinator, ProgressRecord, ProgressSink, ProgressTracker};
pub use provision::{Allocation, Provisioner};
pub use store::{ClusterStore, ConfigStore, SshKey, SshKeyRegistry};
pub use transport::{RemoteExecutor, SshTransport};
pub use types::{Cluster, ClusterPhase, ClusterSpec, Node, NodeRole, NodeTemplate, RemoteCommand};
