use crate::components::{CacheConfig, DatabaseConfig, JobsConfig, LoggingConfig, QueueConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const ENV_LOG_LEVEL: &str = "FOREMAN_LOG_LEVEL";
pub const ENV_QUEUE_CAPACITY: &str = "FOREMAN_QUEUE_CAPACITY";
pub const ENV_SHELL_DUMP: &str = "FOREMAN_SHELL_DUMP";
pub const ENV_MYSQLDUMP_PATH: &str = "FOREMAN_MYSQLDUMP_PATH";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

/// Complete agent configuration. Every section falls back to its defaults
/// when absent from the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub queue: QueueConfig,
    pub cache: CacheConfig,
    pub database: DatabaseConfig,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

impl AgentConfig {
    /// Override fields from `FOREMAN_*` environment variables.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
            debug!(level = %level, "Log level overridden from environment");
            self.logging.level = level;
        }

        if let Ok(capacity) = std::env::var(ENV_QUEUE_CAPACITY) {
            self.queue.capacity = capacity.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: ENV_QUEUE_CAPACITY.to_string(),
                value: capacity.clone(),
            })?;
        }

        if let Ok(shell_dump) = std::env::var(ENV_SHELL_DUMP) {
            self.database.shell_dump = parse_flag(&shell_dump).ok_or_else(|| ConfigError::InvalidValue {
                field: ENV_SHELL_DUMP.to_string(),
                value: shell_dump.clone(),
            })?;
        }

        if let Ok(path) = std::env::var(ENV_MYSQLDUMP_PATH) {
            self.database.mysqldump_path = path;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "queue.capacity".to_string(),
                value: "0".to_string(),
            });
        }

        if self.database.mysqldump_path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database.mysqldump_path".to_string(),
                value: self.database.mysqldump_path.clone(),
            });
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [ENV_LOG_LEVEL, ENV_QUEUE_CAPACITY, ENV_SHELL_DUMP, ENV_MYSQLDUMP_PATH] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.queue.capacity, 256);
        assert_eq!(config.cache.update_ttl_secs, 43_200);
        assert_eq!(config.cache.white_label_ttl_secs, 259_200);
        assert!(config.database.shell_dump);
        assert_eq!(config.database.mysqldump_path, "mysqldump");
        assert!(config.jobs.upgrade_translations_after_upgrade);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn env_overrides_apply() {
        clear_env();
        std::env::set_var(ENV_LOG_LEVEL, "debug");
        std::env::set_var(ENV_QUEUE_CAPACITY, "8");
        std::env::set_var(ENV_SHELL_DUMP, "off");
        std::env::set_var(ENV_MYSQLDUMP_PATH, "/usr/local/bin/mysqldump");

        let mut config = AgentConfig::default();
        config.apply_env_overrides().unwrap();
        clear_env();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.queue.capacity, 8);
        assert!(!config.database.shell_dump);
        assert_eq!(config.database.mysqldump_path, "/usr/local/bin/mysqldump");
    }

    #[test]
    #[serial]
    fn invalid_env_capacity_is_rejected() {
        clear_env();
        std::env::set_var(ENV_QUEUE_CAPACITY, "lots");

        let err = AgentConfig::default().apply_env_overrides().unwrap_err();
        clear_env();

        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == ENV_QUEUE_CAPACITY));
    }

    #[test]
    fn validate_rejects_zero_capacity_and_empty_dump_path() {
        let mut config = AgentConfig::default();
        config.queue.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.database.mysqldump_path = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
