//! # Configuration
//!
//! TOML configuration for the Neighbor persistence layer.
//!
//! ## Sections
//!
//! - [`StorageConfig`] - SQLite database path and legacy file location
//! - [`FamilyConfig`] - deployment default family used for pre-family legacy lines
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Configuration File Format
//!
//! ```toml
//! [storage]
//! database_path = "./data/players.db"
//! legacy_dir = "./data/legacy"
//! legacy_file_template = "neighbors_{family}.txt"
//!
//! [families]
//! default_family = 1001
//!
//! [logging]
//! level = "info"
//! file = "neighbors.log"
//! ```
//!
//! `default_family` has no built-in value: legacy lines stored with family `0`
//! are only matched once a deployment names its default family here.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::neighbor::legacy::FAMILY_PLACEHOLDER;
use crate::neighbor::types::UNASSIGNED_FAMILY;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub families: FamilyConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: String,
    pub legacy_dir: String,
    /// File name inside `legacy_dir`; `{family}` is replaced by the family id.
    #[serde(default = "default_legacy_file_template")]
    pub legacy_file_template: String,
}

fn default_legacy_file_template() -> String {
    "neighbors_{family}.txt".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FamilyConfig {
    /// Family that owns legacy lines written with family 0, and the family
    /// used for callers that do not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_family: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Config {
    /// Load and validate configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config = Self::from_toml_str(&content)
            .map_err(|e| anyhow!("Failed to load config file {}: {}", path, e))?;

        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.families.default_family == Some(UNASSIGNED_FAMILY) {
            return Err(anyhow!(
                "families.default_family cannot be {} (reserved for unassigned)",
                UNASSIGNED_FAMILY
            ));
        }
        if !self
            .storage
            .legacy_file_template
            .contains(FAMILY_PLACEHOLDER)
        {
            return Err(anyhow!(
                "storage.legacy_file_template must contain {}",
                FAMILY_PLACEHOLDER
            ));
        }
        if self.storage.database_path.trim().is_empty() {
            return Err(anyhow!("storage.database_path cannot be empty"));
        }
        Ok(())
    }

    /// Log level from the config, falling back to `Info` for unknown names.
    pub fn log_level(&self) -> log::LevelFilter {
        self.logging
            .level
            .parse()
            .unwrap_or(log::LevelFilter::Info)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig {
                database_path: "./data/players.db".to_string(),
                legacy_dir: "./data/legacy".to_string(),
                legacy_file_template: default_legacy_file_template(),
            },
            families: FamilyConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("neighbors.log".to_string()),
            },
        }
    }
}
