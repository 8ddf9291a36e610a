//! Branding overrides pushed by the management service.
//!
//! The record lives in the transient cache. A missing entry is fetched from
//! the service on the next read; a cached `null` means "no branding" and is
//! served as-is until it expires or is overwritten.

use crate::cache::TransientCache;
use crate::normalize::is_empty;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const WHITE_LABEL_KEY: &str = "white_label";

/// Remote side of the white-label record.
#[async_trait]
pub trait WhiteLabelSource: Send + Sync {
    /// Whether the agent has ever been connected to the service.
    fn is_connected(&self) -> bool;

    async fn fetch(&self) -> anyhow::Result<Value>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhiteLabelRecord {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "AuthorURI", default)]
    pub author_uri: String,
    #[serde(rename = "Author", default)]
    pub author: String,
    #[serde(rename = "AuthorName", default)]
    pub author_name: String,
    #[serde(rename = "PluginURI", default)]
    pub plugin_uri: String,
    #[serde(default)]
    pub hide: bool,
    #[serde(default)]
    pub status: String,
}

impl WhiteLabelRecord {
    pub fn disabled() -> Self {
        Self {
            status: "disabled".to_string(),
            ..Default::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status == "enabled"
    }

    /// Map the service payload (`name`, `description`, `author_url`, ...) to a record.
    pub fn from_payload(payload: &Value) -> Self {
        let text = |key: &str| {
            payload
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            name: text("name"),
            title: text("name"),
            description: text("description"),
            author_uri: text("author_url"),
            author: text("author"),
            author_name: text("author_name"),
            plugin_uri: String::new(),
            hide: payload.get("hide").map(|hide| !is_empty(hide)).unwrap_or(false),
            status: text("status"),
        }
    }
}

pub struct WhiteLabelService {
    source: Arc<dyn WhiteLabelSource>,
    cache: Arc<dyn TransientCache>,
    ttl: Duration,
}

impl WhiteLabelService {
    pub fn new(source: Arc<dyn WhiteLabelSource>, cache: Arc<dyn TransientCache>, ttl: Duration) -> Self {
        Self { source, cache, ttl }
    }

    /// Current record; `None` when branding is explicitly unset.
    pub async fn get(&self) -> Option<WhiteLabelRecord> {
        if !self.source.is_connected() {
            return Some(WhiteLabelRecord::disabled());
        }

        if self.cache.get(WHITE_LABEL_KEY).is_none() {
            match self.source.fetch().await {
                Ok(payload) => self.update(&payload),
                Err(e) => {
                    warn!("Failed to fetch white-label record: {:#}", e);
                    self.update(&Value::Null);
                }
            }
        }

        self.cached()
    }

    /// Replace the cached record. An empty payload caches `null`.
    pub fn update(&self, payload: &Value) {
        self.cache.invalidate(WHITE_LABEL_KEY);

        let value = if is_empty(payload) {
            Value::Null
        } else {
            serde_json::to_value(WhiteLabelRecord::from_payload(payload)).unwrap_or(Value::Null)
        };
        debug!(empty = value.is_null(), "Storing white-label record");
        self.cache.set(WHITE_LABEL_KEY, value, self.ttl);
    }

    fn cached(&self) -> Option<WhiteLabelRecord> {
        let value = self.cache.get(WHITE_LABEL_KEY)?;
        if value.is_null() {
            return None;
        }
        match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Discarding malformed white-label record: {}", e);
                None
            }
        }
    }
}
