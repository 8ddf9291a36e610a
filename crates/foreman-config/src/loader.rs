use crate::config::{AgentConfig, ConfigError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

impl AgentConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;

        let config = Self::from_toml_str(&contents)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise use defaults.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            Self::load_from_file(path).await
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// `<config dir>/foreman/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("foreman").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = AgentConfig::from_toml_str(
            r#"
            [queue]
            capacity = 16

            [database]
            shell_dump = false
            "#,
        )
        .unwrap();

        assert_eq!(config.queue.capacity, 16);
        assert!(!config.database.shell_dump);
        assert_eq!(config.database.mysqldump_path, "mysqldump");
        assert_eq!(config.cache.update_ttl_secs, 43_200);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = AgentConfig::from_toml_str("[queue\ncapacity = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[tokio::test]
    async fn load_from_file_reads_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foreman.toml");
        std::fs::write(&path, "[logging]\nlevel = \"trace\"\n").unwrap();

        let config = AgentConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.logging.level, "trace");
    }

    #[tokio::test]
    async fn missing_file_is_io_error_but_load_or_default_succeeds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");

        assert!(matches!(
            AgentConfig::load_from_file(&path).await,
            Err(ConfigError::Io { .. })
        ));
        assert_eq!(AgentConfig::load_or_default(&path).await.unwrap(), AgentConfig::default());
    }
}
