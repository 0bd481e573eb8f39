//! Core metrics definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `_total` suffix for counters
//! - `_seconds` suffix for histograms measuring duration

use crate::types::{ClusterPhase, NodeRole};
use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Register all core metrics with descriptions.
pub fn register_core_metrics() {
    describe_counter!(
        "hkube_nodes_allocated_total",
        "Nodes allocated (by role, source: created or fetched)"
    );
    describe_counter!("hkube_remote_commands_total", "Remote commands executed (by outcome)");
    describe_counter!(
        "hkube_provision_retries_total",
        "Package provisioning phase retries after a failure"
    );
    describe_histogram!("hkube_phase_duration_seconds", "Cluster creation phase duration (by phase)");
}

pub fn record_node_allocated(role: NodeRole, fetched: bool) {
    let source = if fetched { "fetched" } else { "created" };
    counter!("hkube_nodes_allocated_total", "role" => role.as_str(), "source" => source).increment(1);
}

pub fn record_remote_command(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("hkube_remote_commands_total", "outcome" => outcome).increment(1);
}

pub fn record_provision_retry() {
    counter!("hkube_provision_retries_total").increment(1);
}

pub fn record_phase(phase: ClusterPhase, duration_secs: f64) {
    histogram!("hkube_phase_duration_seconds", "phase" => phase.as_str()).record(duration_secs);
}
