//! Database inspection, schema upgrade and dumps.

use crate::dump::{DumpOptions, DumpReport, FallbackDump};
use crate::error::{DumpError, ManagerError};
use crate::guard::guarded;
use crate::host::{DatabaseEngine, DatabaseHost};
use crate::types::{ItemActionResult, ItemKind};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// A table with its size in bytes and its name split at the site prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub size: u64,
    /// The site prefix when the name starts with it, otherwise empty.
    pub prefix: String,
    /// The name without the prefix.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseInfo {
    pub extension: Option<String>,
    pub server: Option<String>,
    pub engine: DatabaseEngine,
    pub client_version: Option<String>,
}

pub struct DatabaseManager {
    host: Arc<dyn DatabaseHost>,
    dumper: FallbackDump,
}

impl DatabaseManager {
    pub fn new(host: Arc<dyn DatabaseHost>, dumper: FallbackDump) -> Self {
        Self { host, dumper }
    }

    pub async fn info(&self) -> DatabaseInfo {
        DatabaseInfo {
            extension: self.host.extension().await,
            server: self.host.server_version().await,
            engine: DatabaseEngine::detect(&self.host.server_info().await),
            client_version: self.host.client_version().await,
        }
    }

    pub async fn tree(&self) -> Result<Vec<TableInfo>, ManagerError> {
        let prefix = self.host.table_prefix();
        let tables = guarded(self.host.tables()).await.map_err(ManagerError::Database)?;

        Ok(tables
            .into_iter()
            .map(|table| {
                let (prefix, path) = match table.name.strip_prefix(prefix.as_str()) {
                    Some(rest) if !prefix.is_empty() => (prefix.clone(), rest.to_string()),
                    _ => (String::new(), table.name.clone()),
                };
                TableInfo {
                    name: table.name,
                    size: table.size,
                    prefix,
                    path,
                }
            })
            .collect())
    }

    /// View names; views are always left out of dumps.
    pub async fn views(&self) -> Result<Vec<String>, ManagerError> {
        guarded(self.host.views()).await.map_err(ManagerError::Database)
    }

    /// Tables matching `excluded` by full name or by unprefixed path, plus all views.
    pub async fn excluded_tables(&self, excluded: &[String]) -> Result<Vec<TableInfo>, ManagerError> {
        let views = self.views().await?;
        let excluded: HashSet<&str> = excluded
            .iter()
            .chain(views.iter())
            .map(String::as_str)
            .collect();

        Ok(self
            .tree()
            .await?
            .into_iter()
            .filter(|table| excluded.contains(table.name.as_str()) || excluded.contains(table.path.as_str()))
            .collect())
    }

    /// Run the schema upgrade. The host reports nothing useful about it, so
    /// the result is always the same optimistic record.
    pub async fn upgrade(&self) -> ItemActionResult {
        info!("Upgrading database schema");
        if let Err(e) = guarded(self.host.upgrade_schema()).await {
            warn!("Database schema upgrade reported an error: {}", e);
        }

        ItemActionResult {
            item: ItemKind::Database.plural().to_string(),
            kind: ItemKind::Database.singular().to_string(),
            success: true,
            response: Value::Bool(true),
            name: None,
        }
    }

    /// Dump the database to `path`. Views are added to the exclusions
    /// whether or not the caller listed them.
    pub async fn dump(&self, path: &Path, options: &DumpOptions) -> Result<DumpReport, DumpError> {
        let views = guarded(self.host.views()).await?;
        let mut options = options.clone();
        for view in views {
            if !options.excluded_tables.contains(&view) {
                options.excluded_tables.push(view);
            }
        }
        self.dumper.dump(path, &options).await
    }
}
