//! `hkube context` commands.

use super::open_store;
use anyhow::Result;
use colored::Colorize;
use hkube_core::ProviderContext;

/// Add a context and make it current
pub fn add(name: &str, token: &str) -> Result<()> {
    if token.trim().is_empty() {
        anyhow::bail!("Token must not be empty");
    }

    let store = open_store()?;
    store.update(|config| {
        config.add_context(ProviderContext { name: name.to_string(), token: token.to_string() });
        Ok(())
    })?;

    println!("{} Context added: {} (current)", "✓".green().bold(), name.bold());
    Ok(())
}

/// Switch the current context
pub fn use_context(name: &str) -> Result<()> {
    let store = open_store()?;
    store.update(|config| config.use_context(name))?;

    println!("{} Switched to context {}", "✓".green().bold(), name.bold());
    Ok(())
}
