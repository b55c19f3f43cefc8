//! Reading and writing `config.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::config::schema::Config;
use crate::utils::helpers::{expand_tilde, get_data_path};

/// Default configuration file (`~/.nyx/config.json`).
pub fn get_config_path() -> PathBuf {
    get_data_path().join("config.json")
}

/// The `--config` path with `~` expanded, or the default location.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(p) => expand_tilde(&p.to_string_lossy()),
        None => get_config_path(),
    }
}

/// A loaded configuration and where it came from.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
    /// Why the file was not used, when defaults were substituted.
    pub fallback: Option<String>,
}

impl LoadedConfig {
    fn defaults(path: PathBuf, reason: String) -> Self {
        warn!(path = %path.display(), "{reason}. Using default configuration.");
        Self {
            config: Config::default(),
            path,
            fallback: Some(reason),
        }
    }
}

/// Load the configuration. A missing or malformed file yields defaults and
/// records the reason in [`LoadedConfig::fallback`].
pub fn load_config(explicit: Option<&Path>) -> LoadedConfig {
    let path = resolve_config_path(explicit);

    let contents = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No config file");
            return LoadedConfig {
                config: Config::default(),
                path,
                fallback: Some("config file not found".to_string()),
            };
        }
        Err(e) => return LoadedConfig::defaults(path, format!("Failed to read config: {e}")),
    };

    match serde_json::from_str::<Config>(&contents) {
        Ok(config) => LoadedConfig {
            config,
            path,
            fallback: None,
        },
        Err(e) => LoadedConfig::defaults(path, format!("Failed to parse config: {e}")),
    }
}

/// Write `config` as pretty JSON, creating parent directories.
pub fn save_config(config: &Config, explicit: Option<&Path>) -> Result<PathBuf> {
    let path = resolve_config_path(explicit);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
