//! Configuration loading from TOML files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global configuration for hsloader
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub sink: SinkConfig,
    pub publisher: PublisherSection,
    pub time: TimeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub host: String,
    pub port: u16,
    pub index_prefix: String,
    pub timeout_secs: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9200,
            index_prefix: "heapstats".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PublisherSection {
    pub bulk_size: usize,
    pub concurrency: usize,
}

impl Default for PublisherSection {
    fn default() -> Self {
        let defaults = hsloader_core::PublisherConfig::default();
        Self {
            bulk_size: defaults.bulk_size,
            concurrency: defaults.concurrency,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// IANA zone id; empty means the system zone
    pub zone: String,
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./hsloader.toml (current directory)
    /// 2. ~/.config/hsloader/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("hsloader.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "hsloader") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
