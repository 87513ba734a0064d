//! # Configuration Management Module
//!
//! Central configuration for the raid ledger, loaded from a TOML file with
//! sensible defaults for every value.
//!
//! ## Configuration Structure
//!
//! - [`LedgerConfig`] - Core ledger settings (data directory, side tracking)
//! - [`ChatConfig`] - Chat query surface settings (bot name, paging, privacy)
//! - [`LoggingConfig`] - Logging settings
//!
//! ## Configuration File Format
//!
//! ```toml
//! [ledger]
//! data_dir = "./data"
//! track_scav_raids = false
//!
//! [chat]
//! bot_name = "RaidRecord"
//! page_limit_max = 20
//! log_victims = true
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Core ledger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Directory holding the per-player record files (under `records/`) and
    /// the optional offline price catalog (`catalog.json`).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Record scav-side raids too. Off by default: scav loadouts are free
    /// handouts and drown the profit statistics in noise.
    #[serde(default)]
    pub track_scav_raids: bool,
}

/// Settings for the chat command surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Display name the command dialog answers under.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    /// Hard upper bound for the `list` command's `limit` parameter.
    #[serde(default = "default_page_limit_max")]
    pub page_limit_max: usize,
    /// Include the victim breakdown in `info` replies. Some players consider
    /// kill lists spoilers; turning this off hides them.
    #[serde(default = "default_log_victims")]
    pub log_victims: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of "error", "warn", "info", "debug", "trace".
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_bot_name() -> String {
    "RaidRecord".to_string()
}

fn default_page_limit_max() -> usize {
    20
}

fn default_log_victims() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            track_scav_raids: false,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            page_limit_max: default_page_limit_max(),
            log_victims: default_log_victims(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

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
        if self.ledger.data_dir.trim().is_empty() {
            return Err(anyhow!("ledger.data_dir must not be empty"));
        }
        if self.chat.page_limit_max == 0 {
            return Err(anyhow!("chat.page_limit_max must be at least 1"));
        }
        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            other => Err(anyhow!("unknown logging.level '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chat.page_limit_max, 20);
        assert!(!config.ledger.track_scav_raids);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: Config = toml::from_str("[ledger]\ndata_dir = \"/var/ledger\"\n")
            .expect("partial config parses");
        assert_eq!(config.ledger.data_dir, "/var/ledger");
        assert_eq!(config.chat.bot_name, "RaidRecord");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn bad_level_is_rejected() {
        let config: Config = toml::from_str("[logging]\nlevel = \"loud\"\n").expect("parses");
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).expect("serializes");
        let back: Config = toml::from_str(&text).expect("parses back");
        assert_eq!(back.ledger.data_dir, config.ledger.data_dir);
        assert_eq!(back.chat.page_limit_max, config.chat.page_limit_max);
    }
}
