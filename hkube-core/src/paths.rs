//! Centralized path configuration for hkube.

use std::path::PathBuf;

/// Get the hkube configuration directory.
///
/// Resolution order:
/// 1. `HKUBE_CONFIG_DIR` environment variable
/// 2. `~/.hkube`
/// 3. `./.hkube` when no home directory can be determined
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HKUBE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    dirs::home_dir().map(|h| h.join(".hkube")).unwrap_or_else(|| PathBuf::from(".hkube"))
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}
