//! Installed-item catalog: enrichment of host metadata with update and
//! activation state.

use crate::cache::TransientCache;
use crate::guard::guarded;
use crate::host::{ItemMetadata, PackageHost, UpdateInfo};
use crate::types::ItemKind;
use deunicode::deunicode_with_tofu;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Active,
    Inactive,
}

impl From<bool> for ItemStatus {
    fn from(active: bool) -> Self {
        if active {
            ItemStatus::Active
        } else {
            ItemStatus::Inactive
        }
    }
}

/// One installed plugin or theme as reported to the management service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub description: String,
    pub author: String,
    pub author_uri: String,
    pub basename: String,
    pub new_version: Option<String>,
    pub requires_php: String,
    pub requires_wp: String,
    pub status: ItemStatus,
    pub homepage: String,
    pub version: String,
}

impl CatalogEntry {
    pub fn build(
        basename: &str,
        meta: &ItemMetadata,
        updates: &BTreeMap<String, UpdateInfo>,
        active: bool,
    ) -> Self {
        Self {
            name: to_ascii(&meta.name),
            description: to_ascii(&meta.description),
            author: to_ascii(&meta.author),
            author_uri: meta.author_uri.clone(),
            basename: basename.to_string(),
            new_version: updates
                .get(basename)
                .and_then(|update| update.new_version.clone()),
            requires_php: meta.requires_php.clone(),
            requires_wp: meta.requires_wp.clone(),
            status: active.into(),
            homepage: meta.homepage.clone(),
            version: meta.version.clone(),
        }
    }
}

/// Cache key of the update snapshot for a kind (`update_plugins`, `update_themes`).
pub fn update_cache_key(kind: ItemKind) -> String {
    format!("update_{}", kind.plural())
}

/// Drop the cached update snapshot, refetch it from the host and store it again.
///
/// A failed refetch leaves no snapshot behind rather than the stale one.
pub async fn refresh_updates<H>(host: &H, cache: &dyn TransientCache, kind: ItemKind, ttl: Duration)
where
    H: PackageHost + ?Sized,
{
    let key = update_cache_key(kind);
    cache.invalidate(&key);

    match guarded(host.available_updates()).await {
        Ok(updates) => match serde_json::to_value(&updates) {
            Ok(value) => {
                cache.set(&key, value, ttl);
                debug!(kind = %kind, count = updates.len(), "Refreshed update snapshot");
            }
            Err(e) => warn!(key = %key, "Failed to serialize update snapshot: {}", e),
        },
        Err(e) => warn!(kind = %kind, "Failed to fetch available updates: {}", e),
    }
}

/// The cached update snapshot for `kind`, empty when absent or unreadable.
pub fn cached_updates(cache: &dyn TransientCache, kind: ItemKind) -> BTreeMap<String, UpdateInfo> {
    let key = update_cache_key(kind);
    let Some(value) = cache.get(&key) else {
        return BTreeMap::new();
    };
    serde_json::from_value(value).unwrap_or_else(|e| {
        warn!(key = %key, "Discarding unreadable update snapshot: {}", e);
        BTreeMap::new()
    })
}

/// Fold text to plain ASCII by transliteration. Characters with no ASCII
/// rendering are dropped.
pub fn to_ascii(text: &str) -> String {
    deunicode_with_tofu(text, "")
}
