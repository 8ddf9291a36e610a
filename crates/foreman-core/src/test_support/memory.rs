use crate::error::{HostError, HostResult};
use crate::host::{
    CoreHost, DatabaseHost, InstallReceipt, ItemMetadata, PackageHost, PluginHost, TableRow,
    ThemeHost, TranslationHost, UpdateInfo,
};
use crate::white_label::WhiteLabelSource;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

/// Package metadata with the given name and version and fixed author fields.
pub fn package(name: &str, version: &str) -> ItemMetadata {
    ItemMetadata {
        name: name.to_string(),
        description: format!("{name} description"),
        author: "Example Author".to_string(),
        author_uri: "https://author.example".to_string(),
        version: version.to_string(),
        requires_php: "7.4".to_string(),
        requires_wp: "6.0".to_string(),
        homepage: String::new(),
    }
}

// ============================================================================
// Call log and fault injection
// ============================================================================

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    panicking_items: Mutex<HashSet<(String, String)>>,
}

impl Recorder {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    /// Apply injected failures for `op`, optionally scoped to one item.
    fn check(&self, op: &str, item: Option<&str>) -> HostResult<()> {
        let item_panics = item
            .map(|item| {
                self.panicking_items
                    .lock()
                    .contains(&(op.to_string(), item.to_string()))
            })
            .unwrap_or(false);
        if item_panics || self.panicking.lock().contains(op) {
            panic!("{op} blew up");
        }
        if self.failing.lock().contains(op) {
            return Err(HostError::platform(format!("{op}_failed"), format!("{op} failed.")));
        }
        Ok(())
    }
}

// ============================================================================
// Shared package store
// ============================================================================

#[derive(Default)]
struct Packages {
    installed: Mutex<Vec<(String, ItemMetadata)>>,
    updates: Mutex<BTreeMap<String, UpdateInfo>>,
    downloads: Mutex<HashMap<String, (String, ItemMetadata)>>,
    modified: Mutex<HashMap<String, SystemTime>>,
    upgrade_results: Mutex<HashMap<String, HostResult<Value>>>,
    recorder: Recorder,
}

impl Packages {
    fn is_installed(&self, basename: &str) -> bool {
        self.installed.lock().iter().any(|(b, _)| b == basename)
    }

    fn add_installed(&self, basename: &str, meta: ItemMetadata) {
        let mut installed = self.installed.lock();
        installed.retain(|(b, _)| b != basename);
        installed.push((basename.to_string(), meta));
    }

    fn remove(&self, basename: &str) -> bool {
        let mut installed = self.installed.lock();
        let before = installed.len();
        installed.retain(|(b, _)| b != basename);
        installed.len() != before
    }

    fn check_for_updates(&self) -> HostResult<()> {
        self.recorder.record("check_for_updates");
        self.recorder.check("check_for_updates", None)
    }

    fn installed(&self) -> HostResult<Vec<(String, ItemMetadata)>> {
        self.recorder.check("installed", None)?;
        Ok(self.installed.lock().clone())
    }

    fn available_updates(&self) -> HostResult<BTreeMap<String, UpdateInfo>> {
        self.recorder.check("available_updates", None)?;
        Ok(self.updates.lock().clone())
    }

    fn install_package(&self, source: &str, overwrite: bool) -> HostResult<InstallReceipt> {
        self.recorder.record(format!("install_package:{source}"));
        self.recorder.check("install_package", Some(source))?;

        let Some((basename, meta)) = self.downloads.lock().get(source).cloned() else {
            return Ok(InstallReceipt::default());
        };

        if !overwrite && self.is_installed(&basename) {
            return Ok(InstallReceipt {
                completed: None,
                data: Some(meta),
            });
        }

        self.add_installed(&basename, meta.clone());
        self.modified.lock().insert(basename, SystemTime::now());
        Ok(InstallReceipt {
            completed: Some(true),
            data: Some(meta),
        })
    }

    fn bulk_upgrade(&self, items: &[String]) -> HostResult<HashMap<String, HostResult<Value>>> {
        self.recorder.record(format!("bulk_upgrade:{}", items.join(",")));
        self.recorder.check("bulk_upgrade", None)?;

        let results = self.upgrade_results.lock();
        Ok(items
            .iter()
            .filter_map(|item| results.get(item).map(|r| (item.clone(), r.clone())))
            .collect())
    }
}

macro_rules! delegate_package_host {
    ($host:ty) => {
        #[async_trait]
        impl PackageHost for $host {
            async fn check_for_updates(&self) -> HostResult<()> {
                self.packages.check_for_updates()
            }

            async fn installed(&self) -> HostResult<Vec<(String, ItemMetadata)>> {
                self.packages.installed()
            }

            async fn available_updates(&self) -> HostResult<BTreeMap<String, UpdateInfo>> {
                self.packages.available_updates()
            }

            async fn install_package(&self, source: &str, overwrite: bool) -> HostResult<InstallReceipt> {
                self.packages.install_package(source, overwrite)
            }

            async fn bulk_upgrade(&self, items: &[String]) -> HostResult<HashMap<String, HostResult<Value>>> {
                self.packages.bulk_upgrade(items)
            }

            async fn modified_at(&self, basename: &str) -> Option<SystemTime> {
                self.packages.modified.lock().get(basename).copied()
            }
        }

        impl $host {
            pub fn add_installed(&self, basename: &str, meta: ItemMetadata) {
                self.packages.add_installed(basename, meta);
            }

            /// Make `url` installable as `basename`.
            pub fn add_package(&self, url: &str, basename: &str, meta: ItemMetadata) {
                self.packages
                    .downloads
                    .lock()
                    .insert(url.to_string(), (basename.to_string(), meta));
            }

            pub fn set_update(&self, basename: &str, version: &str) {
                self.packages.updates.lock().insert(
                    basename.to_string(),
                    UpdateInfo {
                        new_version: Some(version.to_string()),
                    },
                );
            }

            pub fn set_modified(&self, basename: &str, at: SystemTime) {
                self.packages.modified.lock().insert(basename.to_string(), at);
            }

            pub fn set_upgrade_result(&self, basename: &str, result: HostResult<Value>) {
                self.packages
                    .upgrade_results
                    .lock()
                    .insert(basename.to_string(), result);
            }

            pub fn is_installed(&self, basename: &str) -> bool {
                self.packages.is_installed(basename)
            }

            /// Return a platform error from every call to `op`.
            pub fn fail_on(&self, op: &str) {
                self.packages.recorder.failing.lock().insert(op.to_string());
            }

            /// Panic on every call to `op`.
            pub fn panic_on(&self, op: &str) {
                self.packages.recorder.panicking.lock().insert(op.to_string());
            }

            /// Panic when `op` is called for `item` only.
            pub fn panic_on_item(&self, op: &str, item: &str) {
                self.packages
                    .recorder
                    .panicking_items
                    .lock()
                    .insert((op.to_string(), item.to_string()));
            }

            pub fn calls(&self) -> Vec<String> {
                self.packages.recorder.calls.lock().clone()
            }
        }
    };
}

// ============================================================================
// Plugins
// ============================================================================

#[derive(Default)]
pub struct MemoryPluginHost {
    packages: Packages,
    active: Mutex<HashSet<String>>,
    network_active: Mutex<HashSet<String>>,
}

impl MemoryPluginHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active(&self, basename: &str, active: bool) {
        let mut set = self.active.lock();
        if active {
            set.insert(basename.to_string());
        } else {
            set.remove(basename);
        }
    }

    pub fn set_network_active(&self, basename: &str, active: bool) {
        let mut set = self.network_active.lock();
        if active {
            set.insert(basename.to_string());
        } else {
            set.remove(basename);
        }
    }

    pub fn is_plugin_active(&self, basename: &str) -> bool {
        self.active.lock().contains(basename)
    }

    fn require(&self, basename: &str) -> HostResult<()> {
        if self.packages.is_installed(basename) {
            Ok(())
        } else {
            Err(HostError::platform("plugin_not_found", "Plugin file does not exist."))
        }
    }
}

delegate_package_host!(MemoryPluginHost);

#[async_trait]
impl PluginHost for MemoryPluginHost {
    async fn is_active(&self, basename: &str) -> bool {
        self.is_plugin_active(basename)
    }

    async fn is_active_for_network(&self, basename: &str) -> bool {
        self.network_active.lock().contains(basename)
    }

    async fn activate(&self, basename: &str, network_wide: bool, silent: bool) -> HostResult<()> {
        let recorder = &self.packages.recorder;
        recorder.record(format!("activate:{basename}:network={network_wide}:silent={silent}"));
        recorder.check("activate", Some(basename))?;
        self.require(basename)?;

        self.set_active(basename, true);
        if network_wide {
            self.set_network_active(basename, true);
        }
        Ok(())
    }

    async fn deactivate(&self, basename: &str, network_wide: bool, silent: bool) -> HostResult<()> {
        let recorder = &self.packages.recorder;
        recorder.record(format!("deactivate:{basename}:network={network_wide}:silent={silent}"));
        recorder.check("deactivate", Some(basename))?;
        self.require(basename)?;

        self.set_active(basename, false);
        if network_wide {
            self.set_network_active(basename, false);
        }
        Ok(())
    }

    async fn validate(&self, basename: &str) -> HostResult<()> {
        self.packages.recorder.check("validate", Some(basename))?;
        self.require(basename)
    }

    async fn delete(&self, basenames: &[String]) -> HostResult<bool> {
        let recorder = &self.packages.recorder;
        recorder.record(format!("delete:{}", basenames.join(",")));
        recorder.check("delete", None)?;

        let mut all = true;
        for basename in basenames {
            all &= self.packages.remove(basename);
            self.set_active(basename, false);
        }
        Ok(all)
    }
}

// ============================================================================
// Themes
// ============================================================================

#[derive(Default)]
pub struct MemoryThemeHost {
    packages: Packages,
    active: Mutex<String>,
}

impl MemoryThemeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active_theme(&self, basename: &str) {
        *self.active.lock() = basename.to_string();
    }

    pub fn active_theme_name(&self) -> String {
        self.active.lock().clone()
    }

    /// Change the display name of an installed theme.
    pub fn rename_installed(&self, basename: &str, name: &str) {
        for (b, meta) in self.packages.installed.lock().iter_mut() {
            if b == basename {
                meta.name = name.to_string();
            }
        }
    }
}

delegate_package_host!(MemoryThemeHost);

#[async_trait]
impl ThemeHost for MemoryThemeHost {
    async fn active_theme(&self) -> HostResult<String> {
        self.packages.recorder.check("active_theme", None)?;
        Ok(self.active_theme_name())
    }

    async fn switch_theme(&self, basename: &str) -> HostResult<()> {
        let recorder = &self.packages.recorder;
        recorder.record(format!("switch_theme:{basename}"));
        recorder.check("switch_theme", Some(basename))?;

        if !self.packages.is_installed(basename) {
            return Err(HostError::platform("theme_not_found", "The theme does not exist."));
        }
        self.set_active_theme(basename);
        Ok(())
    }

    async fn delete_theme(&self, basename: &str) -> HostResult<bool> {
        let recorder = &self.packages.recorder;
        recorder.record(format!("delete_theme:{basename}"));
        recorder.check("delete_theme", Some(basename))?;

        if !self.packages.remove(basename) {
            return Err(HostError::platform("theme_not_found", "The theme does not exist."));
        }
        Ok(true)
    }
}

// ============================================================================
// Core and translations
// ============================================================================

/// Upgrader returning a fixed outcome, usable as core or translation host.
pub struct MemoryUpgrader {
    outcome: HostResult<Value>,
    panic_message: Option<String>,
    upgrades: AtomicUsize,
}

pub type MemoryCoreHost = MemoryUpgrader;
pub type MemoryTranslationHost = MemoryUpgrader;

impl MemoryUpgrader {
    pub fn new(outcome: HostResult<Value>) -> Self {
        Self {
            outcome,
            panic_message: None,
            upgrades: AtomicUsize::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Ok(Value::Null))
    }

    pub fn panicking(message: &str) -> Self {
        Self {
            panic_message: Some(message.to_string()),
            ..Self::succeeding()
        }
    }

    pub fn upgrades(&self) -> usize {
        self.upgrades.load(Ordering::SeqCst)
    }

    fn run(&self) -> HostResult<Value> {
        self.upgrades.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.panic_message {
            panic!("{}", message);
        }
        self.outcome.clone()
    }
}

#[async_trait]
impl CoreHost for MemoryUpgrader {
    async fn upgrade_core(&self) -> HostResult<Value> {
        self.run()
    }
}

#[async_trait]
impl TranslationHost for MemoryUpgrader {
    async fn upgrade_translations(&self) -> HostResult<Value> {
        self.run()
    }
}

// ============================================================================
// Database
// ============================================================================

struct MemoryTable {
    name: String,
    create: String,
    rows: Vec<Map<String, Value>>,
    view: bool,
}

pub struct MemoryDatabaseHost {
    database: String,
    prefix: String,
    tables: Mutex<Vec<MemoryTable>>,
    server_info: Mutex<String>,
    fail_upgrade: Mutex<bool>,
    upgrades: AtomicUsize,
}

impl MemoryDatabaseHost {
    pub fn new(database: &str, prefix: &str) -> Self {
        Self {
            database: database.to_string(),
            prefix: prefix.to_string(),
            tables: Mutex::new(Vec::new()),
            server_info: Mutex::new("8.0.36".to_string()),
            fail_upgrade: Mutex::new(false),
            upgrades: AtomicUsize::new(0),
        }
    }

    /// Add a table; non-object rows are ignored.
    pub fn add_table(&self, name: &str, create: &str, rows: Vec<Value>) {
        let rows = rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        self.tables.lock().push(MemoryTable {
            name: name.to_string(),
            create: create.to_string(),
            rows,
            view: false,
        });
    }

    pub fn add_view(&self, name: &str) {
        self.tables.lock().push(MemoryTable {
            name: name.to_string(),
            create: format!("CREATE VIEW `{name}` AS SELECT 1"),
            rows: Vec::new(),
            view: true,
        });
    }

    pub fn set_server_info(&self, info: &str) {
        *self.server_info.lock() = info.to_string();
    }

    pub fn fail_upgrade(&self) {
        *self.fail_upgrade.lock() = true;
    }

    pub fn upgrades(&self) -> usize {
        self.upgrades.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseHost for MemoryDatabaseHost {
    fn database_name(&self) -> String {
        self.database.clone()
    }

    fn table_prefix(&self) -> String {
        self.prefix.clone()
    }

    async fn tables(&self) -> HostResult<Vec<TableRow>> {
        Ok(self
            .tables
            .lock()
            .iter()
            .map(|table| TableRow {
                name: table.name.clone(),
                size: 16_384 * (table.rows.len() as u64 + 1),
            })
            .collect())
    }

    async fn views(&self) -> HostResult<Vec<String>> {
        Ok(self
            .tables
            .lock()
            .iter()
            .filter(|table| table.view)
            .map(|table| table.name.clone())
            .collect())
    }

    async fn extension(&self) -> Option<String> {
        Some("mysqli".to_string())
    }

    async fn server_version(&self) -> Option<String> {
        Some("8.0.36".to_string())
    }

    async fn server_info(&self) -> String {
        self.server_info.lock().clone()
    }

    async fn client_version(&self) -> Option<String> {
        Some("mysqlnd 8.2.0".to_string())
    }

    async fn upgrade_schema(&self) -> HostResult<()> {
        self.upgrades.fetch_add(1, Ordering::SeqCst);
        if *self.fail_upgrade.lock() {
            return Err(HostError::platform("db_upgrade_failed", "Schema upgrade failed."));
        }
        Ok(())
    }

    async fn create_statement(&self, table: &str) -> HostResult<String> {
        self.tables
            .lock()
            .iter()
            .find(|t| t.name == table)
            .map(|t| t.create.clone())
            .ok_or_else(|| HostError::platform("table_not_found", format!("Table {table} does not exist.")))
    }

    async fn table_rows(&self, table: &str) -> HostResult<Vec<Map<String, Value>>> {
        self.tables
            .lock()
            .iter()
            .find(|t| t.name == table)
            .map(|t| t.rows.clone())
            .ok_or_else(|| HostError::platform("table_not_found", format!("Table {table} does not exist.")))
    }
}

// ============================================================================
// White label
// ============================================================================

pub struct MemoryWhiteLabelSource {
    connected: bool,
    payload: Option<Value>,
    fetches: AtomicUsize,
}

impl MemoryWhiteLabelSource {
    pub fn returning(payload: Value) -> Self {
        Self {
            connected: true,
            payload: Some(payload),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            payload: None,
            ..Self::returning(Value::Null)
        }
    }

    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::returning(Value::Null)
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WhiteLabelSource for MemoryWhiteLabelSource {
    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn fetch(&self) -> anyhow::Result<Value> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.payload
            .clone()
            .ok_or_else(|| anyhow::anyhow!("management service unreachable"))
    }
}
