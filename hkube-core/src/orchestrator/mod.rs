//! Cluster creation pipeline.
//!
//! [`ClusterOrchestrator`] drives a cluster through its phases, strictly in
//! order:
//!
//! ```text
//! Empty -> MastersAllocated -> WorkersAllocated -> PackagesProvisioned
//!       -> MasterInstalled -> WorkersInstalled -> Complete
//! ```
//!
//! Every phase method takes a [`Cluster`] snapshot and returns the next one.
//! The snapshot is saved after each phase, so a failed run leaves the last
//! completed phase on disk and re-running the pipeline picks up existing
//! servers by name.

use crate::bootstrap::commands::{JOIN_TOKEN_COMMAND, LABEL_COMPLETE, LABEL_REGISTERING_NODE};
use crate::bootstrap::{BootstrapExecutor, BootstrapPlan};
use crate::cloud::CloudProvider;
use crate::config::PipelineConfig;
use crate::error::{HkubeError, Result};
use crate::observability::metrics;
use crate::progress::ProgressCoordinator;
use crate::provision::Provisioner;
use crate::store::ClusterStore;
use crate::transport::RemoteExecutor;
use crate::types::{Cluster, ClusterPhase, ClusterSpec, Node, NodeTemplate, RemoteCommand};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

/// External collaborators of the pipeline.
#[derive(Clone)]
pub struct Collaborators {
    pub cloud: Arc<dyn CloudProvider>,
    pub transport: Arc<dyn RemoteExecutor>,
    pub store: Arc<dyn ClusterStore>,
    pub progress: Arc<dyn ProgressCoordinator>,
}

/// Top-level cluster creation state machine.
pub struct ClusterOrchestrator {
    provisioner: Provisioner,
    executor: BootstrapExecutor,
    progress: Arc<dyn ProgressCoordinator>,
    store: Arc<dyn ClusterStore>,
    plan: BootstrapPlan,
    config: PipelineConfig,
}

impl ClusterOrchestrator {
    /// Create an orchestrator.
    ///
    /// `provider_token` is installed into the cluster for the cloud
    /// controller manager.
    pub fn new(collaborators: Collaborators, config: PipelineConfig, provider_token: impl Into<String>) -> Self {
        let Collaborators { cloud, transport, store, progress } = collaborators;
        let provisioner = Provisioner::new(cloud).with_image(&config.image);
        let executor = BootstrapExecutor::new(transport, progress.clone())
            .with_command_timeout(config.command_timeout());
        let plan = BootstrapPlan::new(&config, provider_token);

        Self { provisioner, executor, progress, store, plan, config }
    }

    /// Run the whole pipeline for `spec`.
    #[instrument(skip(self, spec), fields(nodes = spec.nodes))]
    pub async fn create_cluster(&self, spec: &ClusterSpec) -> Result<Cluster> {
        let mut cluster = Cluster::new(spec.resolve_name());
        cluster.self_hosted = spec.self_hosted;
        info!(cluster = %cluster.name, "Creating cluster");

        let cluster = self.allocate_masters(cluster, spec).await?;
        let cluster = self.allocate_workers(cluster, spec).await?;

        self.settle(&cluster).await;
        self.register_progress(&cluster).map_err(|e| e.in_phase(ClusterPhase::PackagesProvisioned))?;

        let cluster = self.provision_packages(cluster).await?;
        let cluster = self.install_master(cluster).await?;
        let cluster = self.install_workers(cluster).await?;
        self.complete(cluster).await
    }

    /// `Empty -> MastersAllocated`: allocate the single master.
    pub async fn allocate_masters(&self, cluster: Cluster, spec: &ClusterSpec) -> Result<Cluster> {
        let phase = ClusterPhase::MastersAllocated;
        let started = Instant::now();
        info!(cluster = %cluster.name, "Creating master nodes");

        let cluster = self.allocate(cluster, &spec.master_template(), 1, phase).await?;
        self.finish_phase(cluster, phase, started)
    }

    /// `MastersAllocated -> WorkersAllocated`: allocate `nodes - 1` workers, if any.
    pub async fn allocate_workers(&self, cluster: Cluster, spec: &ClusterSpec) -> Result<Cluster> {
        let phase = ClusterPhase::WorkersAllocated;
        let started = Instant::now();

        let count = spec.worker_count();
        let cluster = if count > 0 {
            info!(cluster = %cluster.name, count, "Creating worker nodes");
            self.allocate(cluster, &spec.worker_template(), count, phase).await?
        } else {
            cluster
        };
        self.finish_phase(cluster, phase, started)
    }

    /// Pause when servers were just created so they can finish booting.
    pub async fn settle(&self, cluster: &Cluster) {
        let delay = self.config.settle_delay();
        if cluster.needs_settle && !delay.is_zero() {
            info!(?delay, "Waiting for new servers to boot");
            tokio::time::sleep(delay).await;
        }
    }

    /// Register the expected step count of every node.
    pub fn register_progress(&self, cluster: &Cluster) -> Result<()> {
        let total = cluster.nodes.len();
        for node in &cluster.nodes {
            self.progress.register(&node.name, self.plan.expected_steps(node.role, total))?;
        }
        Ok(())
    }

    /// `WorkersAllocated -> PackagesProvisioned`: install docker and kubeadm everywhere.
    ///
    /// A failure re-runs the phase for every node, up to
    /// `provision_retries` extra times.
    #[instrument(skip(self, cluster), fields(cluster = %cluster.name))]
    pub async fn provision_packages(&self, cluster: Cluster) -> Result<Cluster> {
        let phase = ClusterPhase::PackagesProvisioned;
        let started = Instant::now();
        let attempts = self.config.provision_retries + 1;

        // Nodes whose progress event was already reported by an earlier attempt.
        let mut reported = HashSet::new();
        let mut attempt = 1;
        loop {
            let result = if self.config.concurrent_provisioning {
                self.provision_concurrently(&cluster, &mut reported).await
            } else {
                self.provision_sequentially(&cluster, &mut reported).await
            };

            match result {
                Ok(()) => break,
                Err(e) if attempt < attempts => {
                    warn!(attempt, attempts, error = %e, "Package provisioning failed, retrying phase");
                    metrics::record_provision_retry();
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempts, error = %e, "Package provisioning failed");
                    return Err(e.in_phase(phase));
                }
            }
        }

        self.finish_phase(cluster, phase, started)
    }

    async fn provision_sequentially(&self, cluster: &Cluster, reported: &mut HashSet<String>) -> Result<()> {
        for node in &cluster.nodes {
            let quiet = reported.contains(&node.name);
            provision_node(&self.executor, &self.plan, node, quiet).await?;
            reported.insert(node.name.clone());
        }
        Ok(())
    }

    /// One task per node; every task is joined and the first failure wins.
    async fn provision_concurrently(&self, cluster: &Cluster, reported: &mut HashSet<String>) -> Result<()> {
        let mut tasks = JoinSet::new();
        for node in cluster.nodes.iter().cloned() {
            let executor = self.executor.clone();
            let plan = self.plan.clone();
            let quiet = reported.contains(&node.name);
            tasks.spawn(async move {
                let result = provision_node(&executor, &plan, &node, quiet).await;
                (node.name, result)
            });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(HkubeError::internal);
            match outcome {
                Ok((name, Ok(()))) => {
                    reported.insert(name);
                }
                Ok((_, Err(e))) | Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// `PackagesProvisioned -> MasterInstalled`: initialize the control plane.
    #[instrument(skip(self, cluster), fields(cluster = %cluster.name))]
    pub async fn install_master(&self, cluster: Cluster) -> Result<Cluster> {
        let phase = ClusterPhase::MasterInstalled;
        let started = Instant::now();

        let master = require_master(&cluster).map_err(|e| e.in_phase(phase))?.clone();
        let commands = self.plan.master_commands(cluster.nodes.len() == 1);

        info!(node = %master.name, commands = commands.len(), "Installing master");
        self.executor.run(&master, &commands).await.map_err(|e| e.in_phase(phase))?;
        self.progress.emit(&master.name, LABEL_COMPLETE).map_err(|e| e.in_phase(phase))?;

        self.finish_phase(cluster, phase, started)
    }

    /// `MasterInstalled -> WorkersInstalled`: join every worker, in order.
    ///
    /// The first failing worker aborts the phase; later workers are not attempted.
    #[instrument(skip(self, cluster), fields(cluster = %cluster.name))]
    pub async fn install_workers(&self, cluster: Cluster) -> Result<Cluster> {
        let phase = ClusterPhase::WorkersInstalled;
        let started = Instant::now();

        let workers: Vec<Node> = cluster.workers().cloned().collect();
        if !workers.is_empty() {
            let master = require_master(&cluster).map_err(|e| e.in_phase(phase))?;
            let join_command =
                self.executor.run_single(master, JOIN_TOKEN_COMMAND).await.map_err(|e| e.in_phase(phase))?;
            let join = self.plan.worker_join_command(&join_command);

            for worker in &workers {
                info!(node = %worker.name, "Joining worker");
                self.join_worker(worker, &join).await.map_err(|e| e.in_phase(phase))?;
            }
        }

        self.finish_phase(cluster, phase, started)
    }

    async fn join_worker(&self, worker: &Node, join: &RemoteCommand) -> Result<()> {
        self.progress.emit(&worker.name, LABEL_REGISTERING_NODE)?;
        self.executor.run(worker, std::slice::from_ref(join)).await?;
        self.progress.emit(&worker.name, LABEL_COMPLETE)
    }

    /// `WorkersInstalled -> Complete`: wait for every node's progress.
    pub async fn complete(&self, cluster: Cluster) -> Result<Cluster> {
        let phase = ClusterPhase::Complete;
        let started = Instant::now();

        self.progress.await_all_complete().await.map_err(|e| e.in_phase(phase))?;
        info!(cluster = %cluster.name, nodes = cluster.nodes.len(), "Cluster successfully created!");

        self.finish_phase(cluster, phase, started)
    }

    async fn allocate(
        &self,
        cluster: Cluster,
        template: &NodeTemplate,
        count: usize,
        phase: ClusterPhase,
    ) -> Result<Cluster> {
        match self.provisioner.allocate_nodes(&cluster.name, template, count).await {
            Ok(allocation) => Ok(cluster.with_nodes(allocation.nodes).with_settle(allocation.created_any)),
            Err(HkubeError::AllocationFailed { node, allocated, source }) => {
                // Keep what was created; a re-run fetches these by name.
                let partial = cluster.with_nodes(allocated.iter().cloned());
                if let Err(e) = self.store.save_cluster(&partial) {
                    warn!(error = %e, "Failed to persist partial allocation");
                }
                error!(node = %node, error = %source, "Allocation failed");
                Err(HkubeError::AllocationFailed { node, allocated, source }.in_phase(phase))
            }
            Err(e) => Err(e.in_phase(phase)),
        }
    }

    fn finish_phase(&self, cluster: Cluster, phase: ClusterPhase, started: Instant) -> Result<Cluster> {
        let cluster = cluster.with_phase(phase);
        self.store.save_cluster(&cluster).map_err(|e| e.in_phase(phase))?;
        metrics::record_phase(phase, started.elapsed().as_secs_f64());
        info!(cluster = %cluster.name, %phase, "Phase complete");
        Ok(cluster)
    }
}

async fn provision_node(executor: &BootstrapExecutor, plan: &BootstrapPlan, node: &Node, quiet: bool) -> Result<()> {
    let command = [plan.package_command(node.role)];
    if quiet {
        executor.run_quiet(node, &command).await
    } else {
        executor.run(node, &command).await
    }
}

fn require_master(cluster: &Cluster) -> Result<&Node> {
    cluster.master().ok_or_else(|| HkubeError::NoMaster { cluster: cluster.name.clone() })
}
