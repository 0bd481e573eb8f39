//! CLI command implementations

pub mod cluster;
pub mod context;
pub mod ssh_key;

use anyhow::{Context, Result};
use hkube_core::{ConfigStore, ProviderContext};

/// Open the configuration store at its default location.
pub(crate) fn open_store() -> Result<ConfigStore> {
    let store = ConfigStore::open_default().context("Failed to load configuration")?;
    tracing::debug!(path = %store.path().display(), "Configuration loaded");
    Ok(store)
}

/// The current provider context, or an error telling the user how to add one.
pub(crate) fn require_context(store: &ConfigStore) -> Result<ProviderContext> {
    store
        .config()
        .current_context()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("No context selected. Run `hkube context add <name> --token <token>` first"))
}
