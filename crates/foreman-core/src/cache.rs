//! Transient key/value cache with per-entry TTL.
//!
//! Used for the update-availability snapshot and the white-label record. A
//! stored `Value::Null` is a real entry and is distinct from a missing key.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub trait TransientCache: Send + Sync {
    /// Cached value if present and not expired.
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value, ttl: Duration);

    fn invalidate(&self, key: &str);
}

/// In-memory cache for transient values
#[derive(Default)]
pub struct MemoryTransientCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }
}

impl MemoryTransientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove expired entries
    pub fn cleanup(&self) {
        self.entries.write().retain(|_, entry| entry.is_fresh());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl TransientCache for MemoryTransientCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .read()
            .get(key)
            .filter(|entry| entry.is_fresh())
            .map(|entry| entry.value.clone())
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) {
        self.entries.write().insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    fn invalidate(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;

    #[test]
    fn test_cache_set_and_get() {
        let cache = MemoryTransientCache::new();
        cache.set("update_plugins", json!({"a": 1}), Duration::from_secs(60));

        assert_eq!(cache.get("update_plugins"), Some(json!({"a": 1})));
        assert_eq!(cache.get("update_themes"), None);
    }

    #[test]
    fn test_null_is_distinct_from_missing() {
        let cache = MemoryTransientCache::new();
        cache.set("white_label", Value::Null, Duration::from_secs(60));

        assert_eq!(cache.get("white_label"), Some(Value::Null));
        cache.invalidate("white_label");
        assert_eq!(cache.get("white_label"), None);
    }

    #[test]
    fn test_cache_expiry_and_cleanup() {
        let cache = MemoryTransientCache::new();
        cache.set("k", json!(1), Duration::from_secs(0));

        sleep(Duration::from_millis(10));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 1);

        cache.cleanup();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_overwrite() {
        let cache = MemoryTransientCache::new();
        cache.set("k", json!("old"), Duration::from_secs(60));
        cache.set("k", json!("new"), Duration::from_secs(60));

        assert_eq!(cache.get("k"), Some(json!("new")));
        assert_eq!(cache.len(), 1);
    }
}
