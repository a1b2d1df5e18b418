//! Broker configuration
//!
//! The configuration surface consumed (not owned) by the broker core:
//! storage backend selection, delivery strategy selection with pool size,
//! the purge-on-start flag, the default topic and the logging options. Read
//! from a TOML file; every section and field has a default so an empty file
//! is a valid configuration.

use crate::delivery::DeliveryMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use strum_macros::{Display, EnumString};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Cannot parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Queue storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, EnumString, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StorageKind {
    /// Volatile in-process queue; pending batches are lost on crash
    Memory,
    /// SQLite-backed durable queue
    Sqlite,
}

/// Delivery strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, EnumString, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DeliveryKind {
    Serial,
    Parallel,
    FixedParallel,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageKind,
    /// Database file path; required for the sqlite backend
    pub path: Option<PathBuf>,
    /// Drop all pending batches on startup
    pub purge_on_start: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::Memory,
            path: None,
            purge_on_start: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeliveryConfig {
    pub mode: DeliveryKind,
    /// Worker pool size for the fixed-parallel mode
    pub workers: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryKind::FixedParallel,
            workers: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerSection {
    /// Topic token substituted for events arriving without one
    pub default_topic: String,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            default_topic: crate::processor::DEFAULT_TOPIC.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: Option<String>,
    /// "text" or "json"
    pub format: Option<String>,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    pub storage: StorageConfig,
    pub delivery: DeliveryConfig,
    pub broker: BrokerSection,
    pub logging: LoggingConfig,
}

impl BrokerConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageKind::Sqlite && self.storage.path.is_none() {
            return Err(ConfigError::Invalid {
                message: "storage.path is required for the sqlite backend".to_string(),
            });
        }
        if self.delivery.mode == DeliveryKind::FixedParallel && self.delivery.workers == 0 {
            return Err(ConfigError::Invalid {
                message: "delivery.workers must be at least 1 for fixed-parallel".to_string(),
            });
        }
        Ok(())
    }

    /// The delivery mode the configuration resolves to
    pub fn delivery_mode(&self) -> DeliveryMode {
        match self.delivery.mode {
            DeliveryKind::Serial => DeliveryMode::Serial,
            DeliveryKind::Parallel => DeliveryMode::Parallel,
            DeliveryKind::FixedParallel => DeliveryMode::FixedParallel {
                workers: self.delivery.workers,
            },
        }
    }

    /// Apply command-line overrides on top of the file configuration
    pub fn override_delivery_mode(&mut self, mode: &str) -> Result<(), ConfigError> {
        self.delivery.mode =
            DeliveryKind::from_str(mode).map_err(|_| ConfigError::Invalid {
                message: format!("unknown delivery mode '{mode}'"),
            })?;
        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: BrokerConfig = toml::from_str("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.storage.backend, StorageKind::Memory);
        assert!(!config.storage.purge_on_start);
        assert_eq!(
            config.delivery_mode(),
            DeliveryMode::FixedParallel { workers: 4 }
        );
        assert_eq!(config.broker.default_topic, crate::processor::DEFAULT_TOPIC);
    }

    #[test]
    fn test_full_config_round_trip() {
        let config: BrokerConfig = toml::from_str(
            r#"
            [storage]
            backend = "sqlite"
            path = "/var/lib/herald/queue.db"
            purge_on_start = true

            [delivery]
            mode = "serial"

            [broker]
            default_topic = "fallback"

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.storage.backend, StorageKind::Sqlite);
        assert!(config.storage.purge_on_start);
        assert_eq!(config.delivery_mode(), DeliveryMode::Serial);
        assert_eq!(config.broker.default_topic, "fallback");
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_sqlite_backend_requires_path() {
        let config: BrokerConfig = toml::from_str("[storage]\nbackend = \"sqlite\"").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let config: BrokerConfig =
            toml::from_str("[delivery]\nmode = \"fixed-parallel\"\nworkers = 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_delivery_mode_override() {
        let mut config = BrokerConfig::default();
        config.override_delivery_mode("parallel").unwrap();
        assert_eq!(config.delivery_mode(), DeliveryMode::Parallel);
        assert!(config.override_delivery_mode("bogus").is_err());
    }
}
