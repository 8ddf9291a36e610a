//! Transient cache and database dump configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of the update-availability snapshot.
    pub update_ttl_secs: u64,
    /// Lifetime of the cached white-label record.
    pub white_label_ttl_secs: u64,
}

impl CacheConfig {
    pub fn update_ttl(&self) -> Duration {
        Duration::from_secs(self.update_ttl_secs)
    }

    pub fn white_label_ttl(&self) -> Duration {
        Duration::from_secs(self.white_label_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            update_ttl_secs: 12 * 60 * 60,
            white_label_ttl_secs: 3 * 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Try the external `mysqldump` binary before the in-process dumper.
    pub shell_dump: bool,
    pub mysqldump_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            shell_dump: true,
            mysqldump_path: "mysqldump".to_string(),
        }
    }
}
