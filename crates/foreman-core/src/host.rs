//! Host platform collaborators.
//!
//! Adapters implement these traits against a concrete site installation. All
//! outcomes are reported as [`HostResult`]; managers never inspect loosely
//! typed success flags.

use crate::error::HostResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::time::SystemTime;

/// Header metadata of an installed plugin or theme.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub author_uri: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub requires_php: String,
    #[serde(default)]
    pub requires_wp: String,
    /// Plugin URI or theme URI.
    #[serde(default)]
    pub homepage: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_version: Option<String>,
}

/// What the host's package installer reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallReceipt {
    /// `None` is the installer's "nothing done" sentinel, which it also uses
    /// when the package is already installed.
    pub completed: Option<bool>,
    /// Header data of the package that was unpacked, if any.
    pub data: Option<ItemMetadata>,
}

/// Discovery, install and upgrade shared by plugins and themes.
#[async_trait]
pub trait PackageHost: Send + Sync {
    /// Ask the update service for fresh version information.
    async fn check_for_updates(&self) -> HostResult<()>;

    /// Installed items keyed by basename, in host order.
    async fn installed(&self) -> HostResult<Vec<(String, ItemMetadata)>>;

    /// Items with a newer version available, keyed by basename.
    async fn available_updates(&self) -> HostResult<BTreeMap<String, UpdateInfo>>;

    async fn install_package(&self, source: &str, overwrite: bool) -> HostResult<InstallReceipt>;

    /// Upgrade several items; the map is keyed by basename in arbitrary order.
    async fn bulk_upgrade(&self, items: &[String]) -> HostResult<HashMap<String, HostResult<Value>>>;

    /// Last modification time of an installed item's directory or main file.
    async fn modified_at(&self, basename: &str) -> Option<SystemTime>;
}

#[async_trait]
pub trait PluginHost: PackageHost {
    async fn is_active(&self, basename: &str) -> bool;

    async fn is_active_for_network(&self, basename: &str) -> bool;

    async fn activate(&self, basename: &str, network_wide: bool, silent: bool) -> HostResult<()>;

    async fn deactivate(&self, basename: &str, network_wide: bool, silent: bool) -> HostResult<()>;

    /// Check that the plugin exists and is loadable.
    async fn validate(&self, basename: &str) -> HostResult<()>;

    /// Remove plugin files; `Ok(true)` only when everything was deleted.
    async fn delete(&self, basenames: &[String]) -> HostResult<bool>;
}

#[async_trait]
pub trait ThemeHost: PackageHost {
    /// Template name of the currently active theme.
    async fn active_theme(&self) -> HostResult<String>;

    async fn switch_theme(&self, basename: &str) -> HostResult<()>;

    async fn delete_theme(&self, basename: &str) -> HostResult<bool>;
}

#[async_trait]
pub trait CoreHost: Send + Sync {
    async fn upgrade_core(&self) -> HostResult<Value>;
}

#[async_trait]
pub trait TranslationHost: Send + Sync {
    async fn upgrade_translations(&self) -> HostResult<Value>;
}

/// A table as reported by the schema catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub name: String,
    pub size: u64,
}

/// Server flavour, detected from the server banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseEngine {
    #[serde(rename = "MySQL")]
    MySql,
    #[serde(rename = "MariaDB")]
    MariaDb,
}

impl DatabaseEngine {
    pub fn detect(server_info: &str) -> Self {
        if server_info.to_ascii_lowercase().contains("mariadb") {
            DatabaseEngine::MariaDb
        } else {
            DatabaseEngine::MySql
        }
    }
}

#[async_trait]
pub trait DatabaseHost: Send + Sync {
    fn database_name(&self) -> String;

    fn table_prefix(&self) -> String;

    async fn tables(&self) -> HostResult<Vec<TableRow>>;

    async fn views(&self) -> HostResult<Vec<String>>;

    /// Driver in use (`mysql`, `mysqli`, `PDO`), if known.
    async fn extension(&self) -> Option<String>;

    async fn server_version(&self) -> Option<String>;

    /// Raw server banner, e.g. `10.6.12-MariaDB-log`.
    async fn server_info(&self) -> String;

    async fn client_version(&self) -> Option<String>;

    /// Run the host's schema upgrade routine.
    async fn upgrade_schema(&self) -> HostResult<()>;

    async fn create_statement(&self, table: &str) -> HostResult<String>;

    async fn table_rows(&self, table: &str) -> HostResult<Vec<Map<String, Value>>>;
}
