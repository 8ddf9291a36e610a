//! Domain layer of the foreman site-management agent.
//!
//! Host collaborators are described by the traits in [`host`]; the lifecycle
//! managers in [`manager`] drive them and shape every outcome into an
//! [`ItemActionResult`] through [`normalize`] and [`bulk`].

pub mod bulk;
pub mod cache;
pub mod catalog;
pub mod dump;
pub mod error;
pub mod guard;
pub mod host;
pub mod manager;
pub mod normalize;
pub mod types;
pub mod white_label;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use bulk::{execute_bulk, RawResults};
pub use cache::{MemoryTransientCache, TransientCache};
pub use catalog::{CatalogEntry, ItemStatus};
pub use dump::{
    ConnectionInfo, DumpOptions, DumpReport, DumpStrategy, FallbackDump, InProcessDumper,
    ShellDumper,
};
pub use error::{DumpError, ErrorInfo, Fault, HostError, HostResult, ManagerError};
pub use guard::{guarded, panic_message};
pub use host::{
    CoreHost, DatabaseEngine, DatabaseHost, InstallReceipt, ItemMetadata, PackageHost, PluginHost,
    TableRow, ThemeHost, TranslationHost, UpdateInfo,
};
pub use manager::{
    CoreManager, DatabaseInfo, DatabaseManager, PluginManager, TableInfo, ThemeManager,
    TranslationManager,
};
pub use normalize::normalize;
pub use types::{ActivationOptions, ActivationTargets, ItemAction, ItemActionResult, ItemKind};
pub use white_label::{WhiteLabelRecord, WhiteLabelService, WhiteLabelSource};
