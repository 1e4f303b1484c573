//! CLI configuration, stored in ~/.giztoy/facedb/config.yaml.
//!
//! ```yaml
//! database: /data/faces.fcdb
//! facedb:
//!   kernel_gamma: 0.001
//!   trim_min_samples: 15
//!   cluster:
//!     threshold: 0.5
//!     seed: 42
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "facedb";
pub const DEFAULT_BASE_DIR: &str = ".giztoy";
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_DB_FILE: &str = "faces.fcdb";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database file. Default: ~/.giztoy/facedb/faces.fcdb.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,

    /// Library settings; missing fields take their defaults.
    #[serde(default)]
    pub facedb: giztoy_facedb::Config,
}

impl Config {
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR).join(APP_NAME))
    }

    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join(DEFAULT_CONFIG_FILE))
    }

    /// Resolves the database path: flag, then config file, then the default
    /// next to the config file.
    pub fn database_path(&self, flag: Option<&str>) -> anyhow::Result<PathBuf> {
        if let Some(p) = flag {
            return Ok(PathBuf::from(p));
        }
        if let Some(p) = &self.database {
            return Ok(p.clone());
        }
        Self::default_config_dir()
            .map(|dir| dir.join(DEFAULT_DB_FILE))
            .ok_or_else(|| anyhow::anyhow!("cannot determine database path, use --db"))
    }
}

/// Loads the config file. A missing default file gives the default config; a
/// missing file named with `--config` is an error.
pub fn load_config(custom_path: Option<&str>) -> anyhow::Result<Config> {
    let (path, explicit) = match custom_path {
        Some(p) => (PathBuf::from(p), true),
        None => match Config::default_config_path() {
            Some(p) => (p, false),
            None => return Ok(Config::default()),
        },
    };

    if !path.exists() {
        if explicit {
            anyhow::bail!("config file '{}' not found", path.display());
        }
        return Ok(Config::default());
    }
    parse_config(&path)
}

fn parse_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg = serde_yaml::from_str(&content)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}
