//! Locating, bootstrapping and reading the host's `config.json`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::HostConfig;

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Per-user directory holding the host config, e.g. `~/.config/extbus` on Linux.
pub fn user_config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Failed to resolve the user config directory")?;
    Ok(base.join("extbus"))
}

/// Path of the user's config file, created with defaults on first run.
pub fn initialize_user_config() -> Result<PathBuf> {
    let path = user_config_dir()?.join(CONFIG_FILE_NAME);
    write_default_config(&path)?;
    Ok(path)
}

/// Where to look for a config when the user directory is unusable.
pub fn fallback_config_path() -> PathBuf {
    std::env::temp_dir().join("extbus").join(CONFIG_FILE_NAME)
}

/// Write the default [`HostConfig`] to `path` unless a file is already there.
///
/// Returns whether a file was written.
pub fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }
    let defaults = serde_json::to_string_pretty(&HostConfig::default())
        .context("Failed to serialize default config")?;
    std::fs::write(path, defaults)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    log::info!("Wrote default config to {:?}", path);
    Ok(true)
}

/// Load the host configuration. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<HostConfig> {
    if !path.exists() {
        log::info!("No config at {:?}, using defaults", path);
        return Ok(HostConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    let config = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;
    Ok(config)
}
