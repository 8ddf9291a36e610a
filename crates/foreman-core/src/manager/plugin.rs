//! Plugin lifecycle: discovery, install, (de)activation, upgrade and delete.

use super::{delete_value, install_failure, most_recent, read_or, status_value};
use crate::bulk::{execute_bulk, RawResults};
use crate::cache::TransientCache;
use crate::catalog::{cached_updates, refresh_updates, CatalogEntry};
use crate::error::{HostError, HostResult, ManagerError};
use crate::guard::guarded;
use crate::host::{ItemMetadata, PluginHost, UpdateInfo};
use crate::normalize::normalize;
use crate::types::{ActivationTargets, ItemAction, ItemActionResult, ItemKind};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const KIND: ItemKind = ItemKind::Plugin;

pub struct PluginManager {
    host: Arc<dyn PluginHost>,
    cache: Arc<dyn TransientCache>,
    update_ttl: Duration,
}

impl PluginManager {
    pub fn new(
        host: Arc<dyn PluginHost>,
        cache: Arc<dyn TransientCache>,
        update_ttl: Duration,
    ) -> Self {
        Self {
            host,
            cache,
            update_ttl,
        }
    }

    /// Installed plugins with update availability and activation status.
    pub async fn all(&self) -> Result<Vec<CatalogEntry>, ManagerError> {
        self.catalog().await.map_err(|source| ManagerError::Discovery {
            kind: KIND.plural(),
            source,
        })
    }

    async fn catalog(&self) -> HostResult<Vec<CatalogEntry>> {
        self.check_for_updates().await;
        let updates = self.updates().await;
        let installed = guarded(self.host.installed()).await?;

        let mut entries = Vec::with_capacity(installed.len());
        for (basename, meta) in &installed {
            let active = read_or(self.host.is_active(basename), false).await;
            entries.push(CatalogEntry::build(basename, meta, &updates, active));
        }
        Ok(entries)
    }

    async fn updates(&self) -> BTreeMap<String, UpdateInfo> {
        refresh_updates(self.host.as_ref(), self.cache.as_ref(), KIND, self.update_ttl).await;
        cached_updates(self.cache.as_ref(), KIND)
    }

    async fn check_for_updates(&self) {
        if let Err(e) = guarded(self.host.check_for_updates()).await {
            debug!("Plugin update check failed: {}", e);
        }
    }

    /// Install a plugin package from `source`.
    ///
    /// With `overwrite == false` an already installed package is reported as
    /// `plugin_already_installed`. The installer signals that case with the
    /// same empty sentinel it uses for other no-op outcomes, so the condition
    /// can only be recognized when overwriting is off.
    pub async fn install(&self, source: &str, overwrite: bool) -> ItemActionResult {
        info!(source = %source, overwrite, "Installing plugin");

        let receipt = match guarded(self.host.install_package(source, overwrite)).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(source = %source, "Plugin install failed: {}", e);
                return normalize(source, &Err(e), ItemAction::Install, KIND);
            }
        };

        let data = match (receipt.completed, receipt.data) {
            (None, _) if !overwrite => {
                return install_failure(
                    source,
                    KIND,
                    "plugin_already_installed",
                    "The plugin is already installed.",
                )
            }
            (_, None) => {
                return install_failure(source, KIND, "no_plugin_installed", "No plugin installed.")
            }
            (_, Some(data)) => data,
        };

        let installed = match guarded(self.host.installed()).await {
            Ok(installed) => installed,
            Err(e) => return normalize(source, &Err(e), ItemAction::Install, KIND),
        };

        // The same plugin may be present several times under different paths.
        let candidates = installed
            .iter()
            .filter(|(_, meta)| same_package(meta, &data))
            .map(|(basename, _)| basename.clone())
            .collect();
        let basename = most_recent(self.host.as_ref(), candidates)
            .await
            .unwrap_or_default();

        self.check_for_updates().await;
        let updates = self.updates().await;
        let active = !basename.is_empty() && read_or(self.host.is_active(&basename), false).await;
        let entry = CatalogEntry::build(&basename, &data, &updates, active);

        let item = if basename.is_empty() { source } else { basename.as_str() };
        let raw = serde_json::to_value(&entry).map_err(|e| HostError::platform("invalid_plugin_data", e.to_string()));
        normalize(item, &raw, ItemAction::Install, KIND)
    }

    pub async fn activate(&self, items: &ActivationTargets) -> Vec<ItemActionResult> {
        let mut results = RawResults::new();

        for (plugin, options) in items {
            let network_wide = match options.network_wide {
                Some(network_wide) => network_wide,
                None => read_or(self.host.is_active_for_network(plugin), false).await,
            };

            let raw = match guarded(self.host.activate(plugin, network_wide, options.silent())).await {
                Ok(()) => Ok(status_value(read_or(self.host.is_active(plugin), false).await)),
                Err(e) => {
                    warn!(item = %plugin, "Plugin activation failed: {}", e);
                    Err(e)
                }
            };
            results.insert(plugin.clone(), raw);
        }

        let order: Vec<&str> = items.iter().map(|(plugin, _)| plugin.as_str()).collect();
        execute_bulk(&order, &results, ItemAction::Activate, KIND)
    }

    pub async fn deactivate(&self, items: &ActivationTargets) -> Vec<ItemActionResult> {
        let mut results = RawResults::new();

        for (plugin, options) in items {
            let network_wide = match options.network_wide {
                Some(network_wide) => network_wide,
                None => read_or(self.host.is_active_for_network(plugin), false).await,
            };

            let raw = match guarded(self.host.deactivate(plugin, network_wide, options.silent())).await {
                Ok(()) => Ok(status_value(!read_or(self.host.is_active(plugin), true).await)),
                Err(e) => {
                    warn!(item = %plugin, "Plugin deactivation failed: {}", e);
                    Err(e)
                }
            };
            results.insert(plugin.clone(), raw);
        }

        let order: Vec<&str> = items.iter().map(|(plugin, _)| plugin.as_str()).collect();
        execute_bulk(&order, &results, ItemAction::Deactivate, KIND)
    }

    pub async fn upgrade(&self, items: &[String]) -> Vec<ItemActionResult> {
        info!(count = items.len(), "Upgrading plugins");

        let results: RawResults = match guarded(self.host.bulk_upgrade(items)).await {
            Ok(results) => results,
            Err(e) => {
                warn!("Plugin bulk upgrade failed: {}", e);
                items.iter().map(|item| (item.clone(), Err(e.clone()))).collect()
            }
        };

        self.check_for_updates().await;
        execute_bulk(items, &results, ItemAction::Upgrade, KIND)
    }

    /// Delete plugins; items failing validation never reach the delete call.
    pub async fn delete(&self, items: &[String]) -> Vec<ItemActionResult> {
        let mut results = RawResults::new();
        let mut valid: Vec<String> = Vec::new();

        for plugin in items {
            match guarded(self.host.validate(plugin)).await {
                Ok(()) if !valid.contains(plugin) => valid.push(plugin.clone()),
                Ok(()) => {}
                Err(e) => {
                    debug!(item = %plugin, "Plugin failed validation: {}", e);
                    results.insert(plugin.clone(), Err(e));
                }
            }
        }

        if !valid.is_empty() {
            let raw: HostResult<Value> = guarded(self.host.delete(&valid)).await.map(delete_value);
            if let Err(e) = &raw {
                warn!(count = valid.len(), "Plugin delete failed: {}", e);
            }
            for plugin in &valid {
                results.insert(plugin.clone(), raw.clone());
            }
        }

        execute_bulk(items, &results, ItemAction::Delete, KIND)
    }
}

fn same_package(a: &ItemMetadata, b: &ItemMetadata) -> bool {
    a.name == b.name
        && a.version == b.version
        && a.requires_wp == b.requires_wp
        && a.requires_php == b.requires_php
        && a.author == b.author
        && a.author_uri == b.author_uri
}
