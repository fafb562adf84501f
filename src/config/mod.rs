//! # Configuration
//!
//! TOML configuration for the graveyard service. Every section is optional and
//! falls back to its `Default` impl, so an empty file is a valid configuration.
//!
//! ```toml
//! [storage]
//! db_path = "data/graveyards.db"
//!
//! [discovery]
//! interval_seconds = 60   # 0 or negative turns the scan off
//! default_range = 20
//!
//! [safety]
//! default_duration_seconds = 15
//! default_range = 16
//!
//! [defaults]              # attributes given to graveyards created in place
//! hidden = true
//! discovery_range = -1    # -1 = use [discovery] default_range
//! safety_time_seconds = -1
//!
//! [logging]
//! level = "info"
//! file = "graveyards.log"
//! ```
//!
//! ```rust,no_run
//! use graveyards::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("config.toml").await?;
//!     let config = Config::load("config.toml").await?;
//!     println!("database: {}", config.storage.db_path);
//!     Ok(())
//! }
//! ```

use anyhow::{anyhow, Result};
use chrono::Duration;
use log::warn;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::model::Attributes;
use crate::tasks::{DiscoverySettings, SafetySettings};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub safety: SafetySettings,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "data/graveyards.db".to_string(),
        }
    }
}

/// Attribute values for graveyards created with "create here".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub enabled: bool,
    pub hidden: bool,
    pub discovery_range: i32,
    pub discovery_message: String,
    pub respawn_message: String,
    pub permission_group: String,
    pub safety_range: i32,
    pub safety_time_seconds: i64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        let attributes = Attributes::default();
        Self {
            enabled: attributes.enabled(),
            hidden: attributes.hidden(),
            discovery_range: attributes.discovery_range(),
            discovery_message: String::new(),
            respawn_message: String::new(),
            permission_group: String::new(),
            safety_range: attributes.safety_range(),
            safety_time_seconds: attributes.safety_time().num_seconds(),
        }
    }
}

impl DefaultsConfig {
    /// Out-of-range values are refused by [`Config::load`]; here they fall back
    /// to the attribute default.
    pub fn attributes(&self) -> Attributes {
        let defaults = Attributes::default();
        let safety_time = Duration::try_seconds(self.safety_time_seconds).unwrap_or_else(|| {
            warn!(
                "defaults.safety_time_seconds {} is out of range, using {}",
                self.safety_time_seconds,
                defaults.safety_time().num_seconds()
            );
            defaults.safety_time()
        });
        defaults
            .with_enabled(self.enabled)
            .with_hidden(self.hidden)
            .with_discovery_range(self.discovery_range)
            .with_discovery_message(self.discovery_message.clone())
            .with_respawn_message(self.respawn_message.clone())
            .with_permission_group(self.permission_group.clone())
            .with_safety_range(self.safety_range)
            .with_safety_time(safety_time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("graveyards.log".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;
        config
            .validate()
            .map_err(|e| anyhow!("Invalid config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Reject values that cannot be represented as time spans.
    pub fn validate(&self) -> Result<()> {
        let spans = [
            ("defaults.safety_time_seconds", self.defaults.safety_time_seconds),
            ("safety.default_duration_seconds", self.safety.default_duration_seconds),
            ("discovery.interval_seconds", self.discovery.interval_seconds),
        ];
        for (name, seconds) in spans {
            if Duration::try_seconds(seconds).is_none() {
                return Err(anyhow!("{} = {} is out of range", name, seconds));
            }
        }
        Ok(())
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let content = toml::to_string_pretty(&Config::default())
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}
