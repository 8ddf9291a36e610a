//! Job queue and job execution configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Jobs buffered before enqueueing waits for the worker.
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Queue a translations upgrade after every plugin, theme or core upgrade.
    pub upgrade_translations_after_upgrade: bool,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            upgrade_translations_after_upgrade: true,
        }
    }
}
