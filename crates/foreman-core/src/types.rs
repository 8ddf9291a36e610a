//! Shared domain types: item kinds, actions and the normalized per-item result.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of manageable unit on the host site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Plugin,
    Theme,
    Core,
    Translation,
    Database,
}

impl ItemKind {
    /// Singular name used in result records (`type` field).
    pub fn singular(&self) -> &'static str {
        match self {
            ItemKind::Plugin => "plugin",
            ItemKind::Theme => "theme",
            ItemKind::Core => "core",
            ItemKind::Translation => "translation",
            ItemKind::Database => "database",
        }
    }

    /// Key used for this kind in command payloads and upgrade result maps.
    pub fn plural(&self) -> &'static str {
        match self {
            ItemKind::Plugin => "plugins",
            ItemKind::Theme => "themes",
            ItemKind::Core => "core",
            ItemKind::Translation => "translations",
            ItemKind::Database => "database",
        }
    }

    /// Core and translation upgrades report no per-step failure detail, so
    /// they follow the optimistic success policy.
    pub fn is_optimistic(&self) -> bool {
        matches!(self, ItemKind::Core | ItemKind::Translation)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.singular())
    }
}

/// Mutating action applied to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemAction {
    Install,
    Activate,
    Deactivate,
    Upgrade,
    Delete,
}

impl ItemAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemAction::Install => "install",
            ItemAction::Activate => "activate",
            ItemAction::Deactivate => "deactivate",
            ItemAction::Upgrade => "upgrade",
            ItemAction::Delete => "delete",
        }
    }
}

impl fmt::Display for ItemAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized outcome of one action on one item.
///
/// `response` is either `{"error": {"code", "message"}}` or the raw success
/// payload with the `source_files` diagnostic key removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemActionResult {
    pub item: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub success: bool,
    pub response: Value,
    /// Display name supplied with an install command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ItemActionResult {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Error code carried in the response, if this is an error record.
    pub fn error_code(&self) -> Option<&str> {
        self.response
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(Value::as_str)
    }
}

/// Per-item options for activation and deactivation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationOptions {
    /// Network-wide activation; `None` keeps the item's current network state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_wide: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silent: Option<bool>,
}

impl ActivationOptions {
    pub fn silent(&self) -> bool {
        self.silent.unwrap_or(false)
    }
}

/// Ordered identifier -> options mapping used by activate/deactivate.
pub type ActivationTargets = Vec<(String, ActivationOptions)>;
