//! `hkube ssh-key` commands.

use super::{open_store, require_context};
use anyhow::{bail, Context, Result};
use colored::Colorize;
use hkube_core::{HcloudClient, SshKey};
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct KeyRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "PRIVATE KEY")]
    private_key: String,
    #[tabled(rename = "PUBLIC KEY")]
    public_key: String,
}

/// Upload a public key to the provider and register the pair locally
pub async fn add(name: &str, private_key_path: &str, public_key_path: &str) -> Result<()> {
    let private_key_path = expand_home(private_key_path);
    let public_key_path = expand_home(public_key_path);

    if !private_key_path.exists() {
        bail!("Private key not found: {}", private_key_path.display());
    }
    let public_key = tokio::fs::read_to_string(&public_key_path)
        .await
        .with_context(|| format!("Failed to read public key {}", public_key_path.display()))?;

    let store = open_store()?;
    let context = require_context(&store)?;

    let client = HcloudClient::new(&context.token)?;
    client.create_ssh_key(name, public_key.trim()).await.context("Failed to upload SSH key")?;

    store.update(|config| {
        config.add_ssh_key(SshKey { name: name.to_string(), private_key_path, public_key_path });
        Ok(())
    })?;

    println!("{} SSH key added: {}", "✓".green().bold(), name.bold());
    Ok(())
}

/// List registered keys
pub fn list() -> Result<()> {
    let store = open_store()?;
    let keys = store.config().ssh_keys;

    if keys.is_empty() {
        println!("No SSH keys registered");
        return Ok(());
    }

    let rows: Vec<KeyRow> = keys
        .into_iter()
        .map(|k| KeyRow {
            name: k.name,
            private_key: k.private_key_path.display().to_string(),
            public_key: k.public_key_path.display().to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{}", table);

    Ok(())
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
