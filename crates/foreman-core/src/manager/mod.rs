//! Lifecycle managers, one per kind of manageable item.
//!
//! Public mutation methods never fail: every host error, caught fault or
//! failed precondition becomes a normalized failure record for the item it
//! concerns.

pub mod core;
pub mod database;
pub mod plugin;
pub mod theme;

pub use self::core::{CoreManager, TranslationManager};
pub use database::{DatabaseInfo, DatabaseManager, TableInfo};
pub use plugin::PluginManager;
pub use theme::ThemeManager;

use crate::error::HostError;
use crate::guard::guarded;
use crate::host::PackageHost;
use crate::normalize::normalize;
use crate::types::{ItemAction, ItemActionResult, ItemKind};
use serde_json::{json, Value};
use std::future::Future;
use std::time::SystemTime;

/// Raw activation outcome in the shape the normalizer expects.
pub(crate) fn status_value(ok: bool) -> Value {
    json!({ "status": if ok { "success" } else { "error" } })
}

/// Raw delete outcome: `true` on success, otherwise the literal `"error"`.
pub(crate) fn delete_value(deleted: bool) -> Value {
    if deleted {
        Value::Bool(true)
    } else {
        Value::String("error".to_string())
    }
}

pub(crate) fn install_failure(
    source: &str,
    kind: ItemKind,
    code: &str,
    message: &str,
) -> ItemActionResult {
    normalize(
        source,
        &Err(HostError::platform(code, message)),
        ItemAction::Install,
        kind,
    )
}

/// Pick the most recently modified of several same-looking installed items.
pub(crate) async fn most_recent<H>(host: &H, candidates: Vec<String>) -> Option<String>
where
    H: PackageHost + ?Sized,
{
    if candidates.len() <= 1 {
        return candidates.into_iter().next();
    }

    let mut stamped: Vec<(Option<SystemTime>, String)> = Vec::with_capacity(candidates.len());
    for basename in candidates {
        stamped.push((read_or(host.modified_at(&basename), None).await, basename));
    }
    // Newest first; items without a timestamp go last.
    stamped.sort_by(|a, b| b.0.cmp(&a.0));
    stamped.into_iter().next().map(|(_, basename)| basename)
}

/// Run a host read that has no error channel, using `default` if it panics.
pub(crate) async fn read_or<F, T>(read: F, default: T) -> T
where
    F: Future<Output = T>,
{
    guarded(async move { Ok(read.await) }).await.unwrap_or(default)
}
