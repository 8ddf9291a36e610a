//! Background job types.
//!
//! A job is created when a mutating command is accepted, consumed once by a
//! worker, and dropped afterwards whatever its outcome.

use crate::protocol::EventKind;
use chrono::{DateTime, Utc};
use foreman_core::{ActivationOptions, ActivationTargets, ItemAction, ItemKind, ManagerError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Invalid {field} payload: {reason}")]
    InvalidPayload { field: String, reason: String },

    #[error("Action {0} cannot run as an item job")]
    UnsupportedAction(ItemAction),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error("Job panicked: {0}")]
    Panicked(String),
}

impl JobError {
    /// Error code reported in the failure event.
    pub fn code(&self) -> &'static str {
        match self {
            JobError::InvalidPayload { .. } => "invalid_payload",
            JobError::UnsupportedAction(_) => "unsupported_action",
            JobError::Manager(ManagerError::Discovery { .. }) => "discovery_failed",
            JobError::Manager(ManagerError::Database(_)) => "database_error",
            JobError::Panicked(_) => "job_panicked",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallTarget {
    Theme,
    #[default]
    #[serde(other)]
    Plugin,
}

impl InstallTarget {
    pub fn kind(&self) -> ItemKind {
        match self {
            InstallTarget::Plugin => ItemKind::Plugin,
            InstallTarget::Theme => ItemKind::Theme,
        }
    }
}

fn default_overwrite() -> bool {
    true
}

/// Payload of a `manager.install` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRequest {
    #[serde(rename = "type", default)]
    pub target: InstallTarget,
    #[serde(rename = "downloadLink")]
    pub download_link: String,
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
    /// Activate the installed item afterwards.
    #[serde(default)]
    pub activate: bool,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobKind {
    /// Refresh the plugin and theme catalogs.
    Update,
    Install(InstallRequest),
    /// An install command whose payload could not be read. Runs only to
    /// report the failure.
    MalformedInstall { download_link: String, reason: String },
    /// Activate, deactivate, upgrade or delete the items named in `payload`.
    ManageItem { payload: Value, action: ItemAction },
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::Update => "update",
            JobKind::Install(_) | JobKind::MalformedInstall { .. } => "install",
            JobKind::ManageItem { .. } => "manage_item",
        }
    }
}

impl JobKind {
    /// Event sent when a job of this kind finishes, successfully or not.
    pub fn completion_event(&self) -> EventKind {
        match self {
            JobKind::Update => EventKind::ManagerUpdated,
            JobKind::Install(_) | JobKind::MalformedInstall { .. } => EventKind::ItemsInstalled,
            JobKind::ManageItem { action, .. } => match action {
                ItemAction::Install => EventKind::ItemsInstalled,
                ItemAction::Activate => EventKind::ItemsActivated,
                ItemAction::Deactivate => EventKind::ItemsDeactivated,
                ItemAction::Upgrade => EventKind::ItemsUpgraded,
                ItemAction::Delete => EventKind::ItemsDeleted,
            },
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::ManageItem { action, .. } => write!(f, "manage_item:{}", action),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: Uuid,
    pub correlation_id: String,
    pub kind: JobKind,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(correlation_id: impl Into<String>, kind: JobKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            correlation_id: correlation_id.into(),
            kind,
            enqueued_at: Utc::now(),
        }
    }

    pub fn update(correlation_id: impl Into<String>) -> Self {
        Self::new(correlation_id, JobKind::Update)
    }

    pub fn install(correlation_id: impl Into<String>, request: InstallRequest) -> Self {
        Self::new(correlation_id, JobKind::Install(request))
    }

    /// Job for an install command whose payload did not parse. The
    /// download link is kept when present so the failure names it.
    pub fn malformed_install(correlation_id: impl Into<String>, payload: &Value, reason: impl Into<String>) -> Self {
        let download_link = payload
            .get("downloadLink")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self::new(
            correlation_id,
            JobKind::MalformedInstall {
                download_link,
                reason: reason.into(),
            },
        )
    }

    pub fn manage(correlation_id: impl Into<String>, payload: Value, action: ItemAction) -> Self {
        Self::new(correlation_id, JobKind::ManageItem { payload, action })
    }
}

/// Payload field for `key`, treating an explicit `null` as absent.
pub(crate) fn present<'a>(payload: &'a Value, key: &str) -> Option<&'a Value> {
    payload.get(key).filter(|value| !value.is_null())
}

/// Identifier -> options map for activate/deactivate. A plain list of
/// identifiers is accepted with default options.
pub(crate) fn activation_targets(field: &str, value: &Value) -> Result<ActivationTargets, JobError> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(item, options)| {
                let options = if options.is_null() {
                    ActivationOptions::default()
                } else {
                    serde_json::from_value(options.clone()).map_err(|e| JobError::InvalidPayload {
                        field: field.to_string(),
                        reason: format!("{}: {}", item, e),
                    })?
                };
                Ok((item.clone(), options))
            })
            .collect(),
        Value::Array(_) => Ok(identifiers(field, value)?
            .into_iter()
            .map(|item| (item, ActivationOptions::default()))
            .collect()),
        other => Err(invalid_shape(field, other)),
    }
}

/// Identifier list for upgrade/delete. An object contributes its keys.
pub(crate) fn identifiers(field: &str, value: &Value) -> Result<Vec<String>, JobError> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(invalid_shape(field, other)),
            })
            .collect(),
        Value::Object(map) => Ok(map.keys().cloned().collect()),
        Value::String(s) => Ok(vec![s.clone()]),
        other => Err(invalid_shape(field, other)),
    }
}

fn invalid_shape(field: &str, value: &Value) -> JobError {
    JobError::InvalidPayload {
        field: field.to_string(),
        reason: format!("unexpected value {}", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn install_request_defaults() {
        let request: InstallRequest =
            serde_json::from_value(json!({"downloadLink": "https://dl.example/a.zip"})).unwrap();
        assert_eq!(request.target, InstallTarget::Plugin);
        assert!(request.overwrite);
        assert!(!request.activate);
        assert_eq!(request.name, None);

        let theme: InstallRequest = serde_json::from_value(json!({
            "type": "theme",
            "downloadLink": "https://dl.example/t.zip",
            "overwrite": false,
            "activate": true,
            "name": "Astra"
        }))
        .unwrap();
        assert_eq!(theme.target.kind(), ItemKind::Theme);
        assert!(!theme.overwrite);
    }

    #[test]
    fn unknown_install_type_means_plugin() {
        let request: InstallRequest =
            serde_json::from_value(json!({"type": "widget", "downloadLink": "x"})).unwrap();
        assert_eq!(request.target, InstallTarget::Plugin);
    }

    #[test]
    fn activation_targets_keep_payload_order() {
        let targets = activation_targets(
            "plugins",
            &json!({
                "zeta/zeta.php": {"network_wide": true},
                "alpha/alpha.php": {"silent": true},
                "mid/mid.php": null
            }),
        )
        .unwrap();

        let order: Vec<&str> = targets.iter().map(|(item, _)| item.as_str()).collect();
        assert_eq!(order, vec!["zeta/zeta.php", "alpha/alpha.php", "mid/mid.php"]);
        assert_eq!(targets[0].1.network_wide, Some(true));
        assert!(targets[1].1.silent());
        assert_eq!(targets[2].1, ActivationOptions::default());
    }

    #[test]
    fn identifiers_reject_non_strings() {
        assert_eq!(
            identifiers("plugins", &json!(["a/a.php", "b/b.php"])).unwrap(),
            vec!["a/a.php", "b/b.php"]
        );
        assert!(matches!(
            identifiers("plugins", &json!([1, 2])),
            Err(JobError::InvalidPayload { .. })
        ));
        assert!(identifiers("themes", &json!(42)).is_err());
    }

    #[test]
    fn completion_event_follows_kind_and_action() {
        assert_eq!(Job::update("m").kind.completion_event(), EventKind::ManagerUpdated);
        assert_eq!(
            Job::manage("m", json!({}), ItemAction::Delete).kind.completion_event(),
            EventKind::ItemsDeleted
        );

        let malformed = Job::malformed_install("m", &json!({"downloadLink": 7}), "bad");
        assert_eq!(malformed.kind.completion_event(), EventKind::ItemsInstalled);
        assert_eq!(malformed.kind.to_string(), "install");
        match malformed.kind {
            JobKind::MalformedInstall { download_link, .. } => assert_eq!(download_link, ""),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn present_ignores_null() {
        let payload = json!({"plugins": null, "translations": ""});
        assert!(present(&payload, "plugins").is_none());
        assert!(present(&payload, "translations").is_some());
        assert!(present(&payload, "core").is_none());
    }
}
