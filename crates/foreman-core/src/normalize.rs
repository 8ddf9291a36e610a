//! Result normalization.
//!
//! Turns a raw host outcome into an [`ItemActionResult`]. Success is decided by
//! a per-action policy, never taken from the host's own flag:
//!
//! | action | success when |
//! |---|---|
//! | install | no error, non-empty result carrying a `basename` |
//! | upgrade | no error and a non-empty `source`, or the result is `true` |
//! | activate / deactivate | no error and `status == "success"` |
//! | delete | the result is exactly `true` |
//!
//! Core and translation items use the optimistic policy: anything except a
//! platform error counts as success, including a caught fault.

use crate::error::{HostError, HostResult};
use crate::types::{ItemAction, ItemActionResult, ItemKind};
use serde_json::{Map, Value};

const SOURCE_FILES: &str = "source_files";
const IDENTIFIER_FIELD: &str = "basename";

pub fn normalize(
    item: &str,
    raw: &HostResult<Value>,
    action: ItemAction,
    kind: ItemKind,
) -> ItemActionResult {
    let success = if kind.is_optimistic() {
        // A caught fault still reports success for these kinds.
        !matches!(raw, Err(HostError::Platform(_)))
    } else {
        is_success(raw, action)
    };

    let (item, response) = match raw {
        Err(err) => (item.to_string(), err.to_response()),
        Ok(value) if success && action == ItemAction::Install && !kind.is_optimistic() => {
            let identifier = identifier(value).unwrap_or(item).to_string();
            (identifier, Value::Object(Map::new()))
        }
        Ok(value) if success => (item.to_string(), strip_source_files(value.clone())),
        Ok(value) => (item.to_string(), value.clone()),
    };

    ItemActionResult {
        item,
        kind: kind.singular().to_string(),
        success,
        response,
        name: None,
    }
}

fn is_success(raw: &HostResult<Value>, action: ItemAction) -> bool {
    let value = match raw {
        Ok(value) => value,
        Err(_) => return false,
    };

    match action {
        ItemAction::Install => !is_empty(value) && identifier(value).is_some(),
        ItemAction::Upgrade => {
            let has_source = value.get("source").map(|s| !is_empty(s)).unwrap_or(false);
            has_source || *value == Value::Bool(true)
        }
        ItemAction::Activate | ItemAction::Deactivate => {
            value.get("status").and_then(Value::as_str) == Some("success")
        }
        ItemAction::Delete => *value == Value::Bool(true),
    }
}

fn identifier(value: &Value) -> Option<&str> {
    value
        .get(IDENTIFIER_FIELD)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn strip_source_files(mut value: Value) -> Value {
    if let Value::Object(map) = &mut value {
        map.remove(SOURCE_FILES);
    }
    value
}

/// Emptiness in the host's loose sense: null, false, 0, "", "0", [] and {}.
pub(crate) fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
