//! Theme lifecycle. A site has exactly one active theme: activation switches
//! to the requested theme and there is no deactivate.

use super::{delete_value, install_failure, most_recent, status_value};
use crate::bulk::{execute_bulk, RawResults};
use crate::cache::TransientCache;
use crate::catalog::{cached_updates, refresh_updates, to_ascii, CatalogEntry};
use crate::error::{HostError, HostResult, ManagerError};
use crate::guard::guarded;
use crate::host::{InstallReceipt, ThemeHost};
use crate::normalize::normalize;
use crate::types::{ActivationTargets, ItemAction, ItemActionResult, ItemKind};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const KIND: ItemKind = ItemKind::Theme;

pub struct ThemeManager {
    host: Arc<dyn ThemeHost>,
    cache: Arc<dyn TransientCache>,
    update_ttl: Duration,
}

impl ThemeManager {
    pub fn new(
        host: Arc<dyn ThemeHost>,
        cache: Arc<dyn TransientCache>,
        update_ttl: Duration,
    ) -> Self {
        Self {
            host,
            cache,
            update_ttl,
        }
    }

    pub async fn active(&self) -> HostResult<String> {
        guarded(self.host.active_theme()).await
    }

    pub async fn all(&self) -> Result<Vec<CatalogEntry>, ManagerError> {
        self.catalog().await.map_err(|source| ManagerError::Discovery {
            kind: KIND.plural(),
            source,
        })
    }

    async fn catalog(&self) -> HostResult<Vec<CatalogEntry>> {
        if let Err(e) = guarded(self.host.check_for_updates()).await {
            debug!("Theme update check failed: {}", e);
        }
        refresh_updates(self.host.as_ref(), self.cache.as_ref(), KIND, self.update_ttl).await;
        let updates = cached_updates(self.cache.as_ref(), KIND);
        let installed = guarded(self.host.installed()).await?;
        let active = self.active().await.unwrap_or_default();

        Ok(installed
            .iter()
            .map(|(basename, meta)| CatalogEntry::build(basename, meta, &updates, *basename == active))
            .collect())
    }

    pub async fn install(&self, source: &str, overwrite: bool) -> ItemActionResult {
        info!(source = %source, overwrite, "Installing theme");

        let receipt = match guarded(self.host.install_package(source, overwrite)).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(source = %source, "Theme install failed: {}", e);
                return normalize(source, &Err(e), ItemAction::Install, KIND);
            }
        };

        let data = match receipt {
            InstallReceipt {
                completed: Some(true),
                data: Some(data),
            } => data,
            _ => return install_failure(source, KIND, "no_theme_installed", "No theme installed."),
        };

        let catalog = match guarded(self.catalog()).await {
            Ok(catalog) => catalog,
            Err(e) => return normalize(source, &Err(e), ItemAction::Install, KIND),
        };

        let name = to_ascii(&data.name);
        let candidates: Vec<&CatalogEntry> = catalog.iter().filter(|entry| entry.name == name).collect();
        let basename = most_recent(
            self.host.as_ref(),
            candidates.iter().map(|entry| entry.basename.clone()).collect(),
        )
        .await;

        let entry = basename.and_then(|basename| candidates.into_iter().find(|entry| entry.basename == basename));
        match entry {
            Some(entry) => {
                let raw = serde_json::to_value(entry)
                    .map_err(|e| HostError::platform("invalid_theme_data", e.to_string()));
                normalize(&entry.basename, &raw, ItemAction::Install, KIND)
            }
            None => normalize(source, &Ok(Value::Null), ItemAction::Install, KIND),
        }
    }

    /// Switch to the first requested theme; any further identifiers are
    /// reported as failed since only one theme can be active.
    pub async fn activate(&self, items: &ActivationTargets) -> Vec<ItemActionResult> {
        let order: Vec<&str> = items.iter().map(|(theme, _)| theme.as_str()).collect();
        let mut results = RawResults::new();

        if let Some(basename) = order.first() {
            let raw = match guarded(self.host.switch_theme(basename)).await {
                Ok(()) => {
                    let active = self.active().await.unwrap_or_default();
                    Ok(status_value(active == *basename))
                }
                Err(e) => {
                    warn!(item = %basename, "Theme switch failed: {}", e);
                    Err(e)
                }
            };
            results.insert(basename.to_string(), raw);
        }

        execute_bulk(&order, &results, ItemAction::Activate, KIND)
    }

    pub async fn upgrade(&self, items: &[String]) -> Vec<ItemActionResult> {
        info!(count = items.len(), "Upgrading themes");

        let results: RawResults = match guarded(self.host.bulk_upgrade(items)).await {
            Ok(results) => results,
            Err(e) => {
                warn!("Theme bulk upgrade failed: {}", e);
                items.iter().map(|item| (item.clone(), Err(e.clone()))).collect()
            }
        };

        if let Err(e) = guarded(self.host.check_for_updates()).await {
            debug!("Theme update check failed: {}", e);
        }
        execute_bulk(items, &results, ItemAction::Upgrade, KIND)
    }

    /// Delete themes. The active theme is refused with `theme_active` and is
    /// never passed to the host.
    pub async fn delete(&self, items: &[String]) -> Vec<ItemActionResult> {
        let mut results = RawResults::new();

        let active = match self.active().await {
            Ok(active) => active,
            Err(e) => {
                warn!("Cannot read active theme, refusing delete: {}", e);
                for theme in items {
                    results.insert(theme.clone(), Err(e.clone()));
                }
                return execute_bulk(items, &results, ItemAction::Delete, KIND);
            }
        };

        for theme in items {
            if results.contains_key(theme) {
                continue;
            }
            let raw = if *theme == active {
                Err(HostError::platform("theme_active", "The theme is currently active."))
            } else {
                guarded(self.host.delete_theme(theme)).await.map(delete_value)
            };
            if let Err(e) = &raw {
                debug!(item = %theme, "Theme not deleted: {}", e);
            }
            results.insert(theme.clone(), raw);
        }

        execute_bulk(items, &results, ItemAction::Delete, KIND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryTransientCache;
    use crate::catalog::ItemStatus;
    use crate::test_support::{package, MemoryThemeHost};
    use crate::types::ActivationOptions;
    use serde_json::json;
    use std::time::SystemTime;

    fn manager(host: &Arc<MemoryThemeHost>) -> ThemeManager {
        ThemeManager::new(
            host.clone(),
            Arc::new(MemoryTransientCache::new()),
            Duration::from_secs(60),
        )
    }

    fn host_with(themes: &[&str], active: &str) -> Arc<MemoryThemeHost> {
        let host = Arc::new(MemoryThemeHost::new());
        for theme in themes {
            host.add_installed(theme, package(theme, "1.0"));
        }
        host.set_active_theme(active);
        host
    }

    #[tokio::test]
    async fn all_marks_active_theme() {
        let host = host_with(&["twentytwenty", "astra"], "astra");
        let entries = manager(&host).all().await.unwrap();

        assert_eq!(entries[0].status, ItemStatus::Inactive);
        assert_eq!(entries[1].status, ItemStatus::Active);
    }

    #[tokio::test]
    async fn delete_refuses_active_theme_without_calling_host() {
        let host = host_with(&["themeX", "themeY"], "themeX");

        let results = manager(&host).delete(&["themeX".to_string()]).await;

        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert_eq!(
            results[0].response,
            json!({"error": {"code": "theme_active", "message": "The theme is currently active."}})
        );
        assert!(!host.calls().iter().any(|c| c.starts_with("delete_theme")));
    }

    #[tokio::test]
    async fn delete_fails_every_item_when_active_theme_read_panics() {
        let host = host_with(&["a", "b"], "b");
        host.panic_on("active_theme");

        let results = manager(&host).delete(&["a".to_string(), "b".to_string()]).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success));
        assert!(results[0].response["error"]["message"].is_string());
        assert!(!host.calls().iter().any(|c| c.starts_with("delete_theme")));
    }

    #[tokio::test]
    async fn all_survives_active_theme_panic() {
        let host = host_with(&["a"], "a");
        host.panic_on("active_theme");

        let entries = manager(&host).all().await.unwrap();
        assert_eq!(entries[0].status, ItemStatus::Inactive);
    }

    #[tokio::test]
    async fn delete_mixed_batch_preserves_order() {
        let host = host_with(&["a", "b", "active"], "active");
        let items: Vec<String> = ["b", "active", "a"].iter().map(|s| s.to_string()).collect();

        let results = manager(&host).delete(&items).await;

        let order: Vec<&str> = results.iter().map(|r| r.item.as_str()).collect();
        assert_eq!(order, vec!["b", "active", "a"]);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[2].success);
    }

    #[tokio::test]
    async fn delete_twice_fails_both_times_after_first() {
        let host = host_with(&["a", "active"], "active");
        let items = vec!["a".to_string()];

        assert!(manager(&host).delete(&items).await[0].success);
        let second = manager(&host).delete(&items).await;
        assert!(!second[0].success);
        let third = manager(&host).delete(&items).await;
        assert!(!third[0].success);
    }

    #[tokio::test]
    async fn activate_switches_only_first_theme() {
        let host = host_with(&["a", "b"], "a");
        let targets = vec![
            ("b".to_string(), ActivationOptions::default()),
            ("a".to_string(), ActivationOptions::default()),
        ];

        let results = manager(&host).activate(&targets).await;

        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert_eq!(host.active_theme_name(), "b");
    }

    #[tokio::test]
    async fn activate_fault_is_isolated_into_result() {
        let host = host_with(&["a"], "a");
        host.panic_on("switch_theme");
        let targets = vec![("a".to_string(), ActivationOptions::default())];

        let results = manager(&host).activate(&targets).await;

        assert!(!results[0].success);
        assert!(results[0].response["error"].is_object());
    }

    #[tokio::test]
    async fn install_picks_newest_matching_theme() {
        let host = host_with(&["astra-old"], "astra-old");
        host.rename_installed("astra-old", "Astra");
        host.set_modified("astra-old", SystemTime::UNIX_EPOCH);
        host.add_package("https://dl.example/astra.zip", "astra", package("Astra", "1.0"));

        let result = manager(&host).install("https://dl.example/astra.zip", true).await;

        assert!(result.success, "{result:?}");
        assert_eq!(result.item, "astra");
        assert_eq!(result.response, json!({}));
    }

    #[tokio::test]
    async fn install_failure_keeps_source_as_item() {
        let host = host_with(&[], "");
        let result = manager(&host).install("https://dl.example/none.zip", true).await;

        assert!(!result.success);
        assert_eq!(result.item, "https://dl.example/none.zip");
        assert_eq!(result.error_code(), Some("no_theme_installed"));
    }
}
