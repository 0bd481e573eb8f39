//! `hkube cluster` commands.

use super::{open_store, require_context};
use crate::progress::NodeProgress;
use anyhow::{Context, Result};
use colored::Colorize;
use hkube_core::{
    Cluster, ClusterOrchestrator, ClusterPhase, ClusterSpec, ClusterStore, Collaborators, HcloudClient,
    ProgressTracker, SshTransport,
};
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "ROLE")]
    role: String,
    #[tabled(rename = "TYPE")]
    server_type: String,
    #[tabled(rename = "IP")]
    ip: String,
}

#[derive(Tabled)]
struct ClusterRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "PHASE")]
    phase: String,
    #[tabled(rename = "NODES")]
    nodes: usize,
    #[tabled(rename = "MASTER IP")]
    master_ip: String,
}

/// Create a cluster
pub async fn create(spec: ClusterSpec) -> Result<()> {
    let store = Arc::new(open_store()?);

    // Everything is checked before a single server is ordered.
    spec.validate(store.as_ref())?;
    let context = require_context(&store)?;
    let pipeline = store.config().pipeline;

    let cloud = HcloudClient::new(&context.token)?
        .with_poll_interval(pipeline.action_poll_interval())
        .with_action_timeout(pipeline.action_timeout());
    let transport = SshTransport::new(store.clone());
    let sink = Arc::new(NodeProgress::new()?);
    let progress = Arc::new(ProgressTracker::with_sink(sink.clone()));

    let collaborators =
        Collaborators { cloud: Arc::new(cloud), transport: Arc::new(transport), store: store.clone(), progress };
    let orchestrator = ClusterOrchestrator::new(collaborators, pipeline, context.token.clone());

    println!(
        "{} Creating cluster with {} node(s) in context {}",
        "→".cyan().bold(),
        spec.nodes,
        context.name.bold()
    );
    sink.start("Creating servers...");

    let cluster = match orchestrator.create_cluster(&spec).await {
        Ok(cluster) => {
            sink.finish();
            cluster
        }
        Err(e) => {
            sink.abandon();
            tracing::error!(error = %e, "Cluster creation failed");
            return Err(e).context("Failed to create cluster");
        }
    };

    println!();
    println!("{} Cluster created: {}", "✓".green().bold(), cluster.name.bold());
    println!();
    print_nodes(&cluster);

    Ok(())
}

/// List clusters
pub fn list() -> Result<()> {
    let store = open_store()?;
    let clusters = store.list_clusters()?;

    if clusters.is_empty() {
        println!("No clusters");
        return Ok(());
    }

    let rows: Vec<ClusterRow> = clusters
        .iter()
        .map(|c| ClusterRow {
            name: c.name.clone(),
            phase: colorize_phase(c.phase),
            nodes: c.nodes.len(),
            master_ip: c
                .master()
                .and_then(|m| m.ip_address)
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{}", table);

    Ok(())
}

fn print_nodes(cluster: &Cluster) {
    let rows: Vec<NodeRow> = cluster
        .nodes
        .iter()
        .map(|n| NodeRow {
            name: n.name.clone(),
            role: n.role.to_string(),
            server_type: n.server_type.clone(),
            ip: n.ip_address.map(|ip| ip.to_string()).unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}

fn colorize_phase(phase: ClusterPhase) -> String {
    match phase {
        ClusterPhase::Complete => phase.as_str().green().to_string(),
        ClusterPhase::Empty => phase.as_str().dimmed().to_string(),
        _ => phase.as_str().yellow().to_string(),
    }
}
