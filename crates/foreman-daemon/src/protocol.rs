//! Command envelope and completion event types
//!
//! Inbound commands carry a correlation id that is passed through to every
//! event their jobs emit.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Decoded inbound management command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    #[serde(rename = "correlationId", alias = "mrid", alias = "request")]
    pub correlation_id: String,
    #[serde(rename = "type")]
    pub command_type: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub debug: Value,
    #[serde(default)]
    pub payload: Value,
}

impl CommandEnvelope {
    pub fn new(correlation_id: impl Into<String>, command_type: impl Into<String>, payload: Value) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            command_type: command_type.into(),
            debug: Value::Null,
            payload,
        }
    }

    /// Debug is requested by any non-empty value (`true`, `1`, `"yes"`).
    pub fn is_debug(&self) -> bool {
        match &self.debug {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64() != Some(0.0),
            Value::String(s) => !s.is_empty() && s != "0",
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        }
    }
}

/// Synchronous answer to a dispatched command.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResponse {
    /// Accepted; any work continues in the background.
    Empty,
    Body(Value),
    /// No handler for the derived name.
    MissingMethod(String),
}

impl DispatchResponse {
    pub fn into_value(self) -> Value {
        match self {
            DispatchResponse::Empty => Value::Null,
            DispatchResponse::Body(body) => body,
            DispatchResponse::MissingMethod(method) => {
                json!({ "method": format!("Missing method: {}", method) })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ItemsInstalled,
    ItemsActivated,
    ItemsDeactivated,
    ItemsDeleted,
    ItemsUpgraded,
    ManagerUpdated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ItemsInstalled => "items_installed",
            EventKind::ItemsActivated => "items_activated",
            EventKind::ItemsDeactivated => "items_deactivated",
            EventKind::ItemsDeleted => "items_deleted",
            EventKind::ItemsUpgraded => "items_upgraded",
            EventKind::ManagerUpdated => "manager_updated",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion event sent to the management service (fire-and-forget).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerEvent {
    pub event: EventKind,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    pub result: Value,
}

impl ManagerEvent {
    pub fn new(event: EventKind, correlation_id: impl Into<String>, result: Value) -> Self {
        Self {
            event,
            correlation_id: correlation_id.into(),
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_accepts_legacy_correlation_keys() {
        let from_mrid: CommandEnvelope =
            serde_json::from_value(json!({"mrid": "m-1", "type": "manager.update"})).unwrap();
        assert_eq!(from_mrid.correlation_id, "m-1");
        assert_eq!(from_mrid.payload, Value::Null);
        assert!(!from_mrid.is_debug());

        let from_request: CommandEnvelope = serde_json::from_value(json!({
            "request": "r-1",
            "type": "manager.install",
            "debug": 1,
            "payload": {"downloadLink": "https://dl.example/a.zip"}
        }))
        .unwrap();
        assert_eq!(from_request.correlation_id, "r-1");
        assert!(from_request.is_debug());
        assert_eq!(from_request.payload["downloadLink"], "https://dl.example/a.zip");
    }

    #[test]
    fn missing_method_response_shape() {
        let value = DispatchResponse::MissingMethod("handleFooBar".to_string()).into_value();
        assert_eq!(value, json!({"method": "Missing method: handleFooBar"}));
        assert_eq!(DispatchResponse::Empty.into_value(), Value::Null);
    }

    #[test]
    fn event_serializes_kind_and_correlation() {
        let event = ManagerEvent::new(EventKind::ItemsUpgraded, "m-9", json!({"plugins": []}));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"items_upgraded\""));
        assert!(json.contains("\"correlationId\":\"m-9\""));
    }
}
