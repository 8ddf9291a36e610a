//! Bulk result assembly.

use crate::error::HostResult;
use crate::normalize::normalize;
use crate::types::{ItemAction, ItemActionResult, ItemKind};
use serde_json::Value;
use std::collections::HashMap;

/// Raw per-item outcomes keyed by identifier, in no particular order.
pub type RawResults = HashMap<String, HostResult<Value>>;

/// Normalize one result per requested item.
///
/// The output has the same length and order as `items`; an item without an
/// entry in `results` is normalized from `null` and therefore fails.
pub fn execute_bulk<S: AsRef<str>>(
    items: &[S],
    results: &RawResults,
    action: ItemAction,
    kind: ItemKind,
) -> Vec<ItemActionResult> {
    let missing: HostResult<Value> = Ok(Value::Null);

    items
        .iter()
        .map(|item| {
            let item = item.as_ref();
            let raw = results.get(item).unwrap_or(&missing);
            normalize(item, raw, action, kind)
        })
        .collect()
}
