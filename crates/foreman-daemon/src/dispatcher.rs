//! Command routing.
//!
//! Each command `type` maps to a handler name (`manager.backup_make` becomes
//! `handleManagerBackupMake`). The table of known names is built once at
//! startup. Mutating commands are acknowledged with an empty response and
//! continue as queued jobs; read-only queries answer inline.

use crate::collaborators::Collaborators;
use crate::jobs::{InstallRequest, Job};
use crate::protocol::{CommandEnvelope, DispatchResponse};
use crate::queue::{JobQueue, QueueError};
use foreman_core::{DatabaseManager, ItemAction, ManagerError, WhiteLabelService};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Login,
    ManagerUpdate,
    ManagerInstall,
    ManagerActivate,
    ManagerDeactivate,
    ManagerUpgrade,
    ManagerDelete,
    ManagerServerInformation,
    ManagerServerHealth,
    ManagerDirectoryTree,
    ManagerDatabaseTree,
    ManagerBackupInformation,
    ManagerBackupMake,
    ManagerBackupRemove,
    ManagerQueueHealth,
    ManagerWhiteLabelUpdate,
}

impl CommandKind {
    pub const ALL: [CommandKind; 16] = [
        CommandKind::Login,
        CommandKind::ManagerUpdate,
        CommandKind::ManagerInstall,
        CommandKind::ManagerActivate,
        CommandKind::ManagerDeactivate,
        CommandKind::ManagerUpgrade,
        CommandKind::ManagerDelete,
        CommandKind::ManagerServerInformation,
        CommandKind::ManagerServerHealth,
        CommandKind::ManagerDirectoryTree,
        CommandKind::ManagerDatabaseTree,
        CommandKind::ManagerBackupInformation,
        CommandKind::ManagerBackupMake,
        CommandKind::ManagerBackupRemove,
        CommandKind::ManagerQueueHealth,
        CommandKind::ManagerWhiteLabelUpdate,
    ];

    /// Canonical command type sent by the management service.
    pub fn command_type(&self) -> &'static str {
        match self {
            CommandKind::Login => "login",
            CommandKind::ManagerUpdate => "manager.update",
            CommandKind::ManagerInstall => "manager.install",
            CommandKind::ManagerActivate => "manager.activate",
            CommandKind::ManagerDeactivate => "manager.deactivate",
            CommandKind::ManagerUpgrade => "manager.upgrade",
            CommandKind::ManagerDelete => "manager.delete",
            CommandKind::ManagerServerInformation => "manager.server_information",
            CommandKind::ManagerServerHealth => "manager.server_health",
            CommandKind::ManagerDirectoryTree => "manager.directory_tree",
            CommandKind::ManagerDatabaseTree => "manager.database_tree",
            CommandKind::ManagerBackupInformation => "manager.backup_information",
            CommandKind::ManagerBackupMake => "manager.backup_make",
            CommandKind::ManagerBackupRemove => "manager.backup_remove",
            CommandKind::ManagerQueueHealth => "manager.queue_health",
            CommandKind::ManagerWhiteLabelUpdate => "manager.white_label_update",
        }
    }

    pub fn handler_name(&self) -> String {
        handler_name(self.command_type())
    }

    /// Item action carried by the job this command enqueues.
    fn item_action(&self) -> Option<ItemAction> {
        match self {
            CommandKind::ManagerActivate => Some(ItemAction::Activate),
            CommandKind::ManagerDeactivate => Some(ItemAction::Deactivate),
            CommandKind::ManagerUpgrade => Some(ItemAction::Upgrade),
            CommandKind::ManagerDelete => Some(ItemAction::Delete),
            _ => None,
        }
    }
}

/// `handle` followed by the studly-cased command type, dots treated as
/// underscores.
pub fn handler_name(command_type: &str) -> String {
    let normalized = command_type.replace('.', "_");
    let studly: String = normalized
        .split(['_', '-', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();
    format!("handle{}", studly)
}

pub struct CommandDispatcher {
    handlers: HashMap<String, CommandKind>,
    queue: Arc<dyn JobQueue>,
    database: Arc<DatabaseManager>,
    white_label: Arc<WhiteLabelService>,
    collaborators: Collaborators,
}

impl CommandDispatcher {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        database: Arc<DatabaseManager>,
        white_label: Arc<WhiteLabelService>,
        collaborators: Collaborators,
    ) -> Self {
        let handlers = CommandKind::ALL
            .iter()
            .map(|kind| (kind.handler_name(), *kind))
            .collect();

        Self {
            handlers,
            queue,
            database,
            white_label,
            collaborators,
        }
    }

    pub async fn dispatch(&self, envelope: CommandEnvelope) -> Result<DispatchResponse, DispatchError> {
        let method = handler_name(&envelope.command_type);
        let Some(kind) = self.handlers.get(&method).copied() else {
            warn!(
                correlation_id = %envelope.correlation_id,
                command = %envelope.command_type,
                "No handler for command: {}",
                method
            );
            return Ok(DispatchResponse::MissingMethod(method));
        };

        if envelope.is_debug() {
            debug!(correlation_id = %envelope.correlation_id, payload = %envelope.payload, "Debug command payload");
        }
        info!(correlation_id = %envelope.correlation_id, handler = %method, "Dispatching command");

        let CommandEnvelope {
            correlation_id,
            payload,
            ..
        } = envelope;

        match kind {
            CommandKind::Login => {
                self.collaborators.login.login(&payload).await?;
                Ok(DispatchResponse::Empty)
            }
            CommandKind::ManagerUpdate => {
                self.queue.enqueue(Job::update(correlation_id)).await?;
                Ok(DispatchResponse::Empty)
            }
            CommandKind::ManagerInstall => {
                let job = match serde_json::from_value::<InstallRequest>(payload.clone()) {
                    Ok(request) => Job::install(correlation_id, request),
                    Err(e) => {
                        warn!(correlation_id = %correlation_id, "Unreadable install payload: {}", e);
                        Job::malformed_install(correlation_id, &payload, e.to_string())
                    }
                };
                self.queue.enqueue(job).await?;
                Ok(DispatchResponse::Empty)
            }
            CommandKind::ManagerActivate
            | CommandKind::ManagerDeactivate
            | CommandKind::ManagerUpgrade
            | CommandKind::ManagerDelete => {
                let Some(action) = kind.item_action() else {
                    return Ok(DispatchResponse::Empty);
                };
                self.queue
                    .enqueue(Job::manage(correlation_id, payload, action))
                    .await?;
                Ok(DispatchResponse::Empty)
            }
            CommandKind::ManagerServerInformation => {
                Ok(DispatchResponse::Body(self.collaborators.server.information().await?))
            }
            CommandKind::ManagerServerHealth => {
                let server = self.collaborators.server.clone();
                detach("server health check", async move { server.health_check().await });
                Ok(DispatchResponse::Empty)
            }
            CommandKind::ManagerDirectoryTree => Ok(DispatchResponse::Body(
                self.collaborators.backups.directory_tree(&payload).await?,
            )),
            CommandKind::ManagerDatabaseTree => {
                let tree = self.database.tree().await?;
                Ok(DispatchResponse::Body(
                    serde_json::to_value(tree).unwrap_or(Value::Null),
                ))
            }
            CommandKind::ManagerBackupInformation => Ok(DispatchResponse::Body(
                self.collaborators.backups.information().await?,
            )),
            CommandKind::ManagerBackupMake => {
                let backups = self.collaborators.backups.clone();
                detach("backup", async move { backups.make(&correlation_id, &payload).await });
                Ok(DispatchResponse::Empty)
            }
            CommandKind::ManagerBackupRemove => {
                let backups = self.collaborators.backups.clone();
                let name = payload.get("name").and_then(Value::as_str).map(str::to_string);
                detach("backup removal", async move { backups.remove(name.as_deref()).await });
                Ok(DispatchResponse::Empty)
            }
            CommandKind::ManagerQueueHealth => {
                let queue_health = self.collaborators.queue_health.clone();
                detach("queue kick", async move { queue_health.kick().await });
                Ok(DispatchResponse::Empty)
            }
            CommandKind::ManagerWhiteLabelUpdate => {
                self.white_label.update(&payload);
                Ok(DispatchResponse::Empty)
            }
        }
    }
}

/// Run work after the empty response has been returned, logging failures.
fn detach<F>(what: &'static str, work: F)
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = work.await {
            error!("Detached {} failed: {:#}", what, e);
        }
    });
}
