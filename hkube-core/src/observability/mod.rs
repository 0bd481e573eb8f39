//! Observability infrastructure: tracing and metrics.
//!
//! Metrics are always recorded through the `metrics` facade, but they go
//! nowhere unless a recorder is installed. `init` installs a Prometheus
//! exporter when `HKUBE_METRICS_ADDR` is set; an embedder calling the library
//! directly installs its own.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod metrics;

/// Environment variable holding a tracing filter (e.g. `hkube_core=debug`).
pub const LOG_ENV: &str = "HKUBE_LOG";

/// Environment variable holding the Prometheus listen address (e.g. `127.0.0.1:9464`).
pub const METRICS_ADDR_ENV: &str = "HKUBE_METRICS_ADDR";

/// Initialize logging, the optional metrics exporter and metric descriptions.
///
/// `verbose` lowers the default level to `debug`; `HKUBE_LOG` overrides both.
/// Call once at startup, from inside the tokio runtime.
pub fn init(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(verbose).with_writer(std::io::stderr))
        .try_init()?;

    if let Ok(value) = std::env::var(METRICS_ADDR_ENV) {
        let addr = parse_metrics_addr(&value)?;
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        tracing::info!(%addr, "Serving Prometheus metrics");
    }

    metrics::register_core_metrics();
    tracing::debug!("Observability initialized");
    Ok(())
}

/// Parse the value of `HKUBE_METRICS_ADDR`.
pub fn parse_metrics_addr(value: &str) -> Result<SocketAddr, String> {
    value.trim().parse().map_err(|e| format!("invalid {} '{}': {}", METRICS_ADDR_ENV, value, e))
}
