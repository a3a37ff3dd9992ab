//! Optional CLI configuration stored next to the templates.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Contents of `<store>/config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Default `applied_by` when `--user` is not given
    pub applied_by: Option<String>,
    /// Tracing filter directives, e.g. `scaffold=debug`
    pub log_filter: Option<String>,
}

impl Config {
    pub const FILE_NAME: &'static str = "config.toml";

    /// Read the config of a store. A missing file yields the defaults.
    pub fn load(store: &Path) -> Result<Self> {
        let path = store.join(Self::FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }
}

/// Default template store location.
pub fn default_store() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".scaffold"))
        .unwrap_or_else(|| PathBuf::from(".scaffold"))
}
