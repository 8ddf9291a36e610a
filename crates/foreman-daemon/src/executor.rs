//! Runs jobs against the lifecycle managers and reports completion.

use crate::jobs::{activation_targets, identifiers, present, InstallRequest, Job, JobError, JobKind};
use crate::notifier::Notifier;
use crate::protocol::ManagerEvent;
use crate::queue::JobQueue;
use foreman_core::{
    CoreManager, DatabaseManager, ItemAction, ItemActionResult, ItemKind, PluginManager,
    ThemeManager, TranslationManager,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The managers a job can reach.
#[derive(Clone)]
pub struct Managers {
    pub plugins: Arc<PluginManager>,
    pub themes: Arc<ThemeManager>,
    pub core: Arc<CoreManager>,
    pub translations: Arc<TranslationManager>,
    pub database: Arc<DatabaseManager>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Queue a translations upgrade after any other upgrade.
    pub upgrade_translations_after_upgrade: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            upgrade_translations_after_upgrade: true,
        }
    }
}

pub struct JobExecutor {
    managers: Managers,
    queue: Arc<dyn JobQueue>,
    notifier: Arc<dyn Notifier>,
    settings: ExecutorSettings,
}

impl JobExecutor {
    pub fn new(
        managers: Managers,
        queue: Arc<dyn JobQueue>,
        notifier: Arc<dyn Notifier>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            managers,
            queue,
            notifier,
            settings,
        }
    }

    /// Run one job and dispatch its completion event.
    ///
    /// Returns the dispatched event, or `None` when the job had nothing to act
    /// on. A failed job still dispatches an event carrying the error.
    pub async fn execute(&self, job: &Job) -> Result<Option<ManagerEvent>, JobError> {
        info!(job_id = %job.id, correlation_id = %job.correlation_id, kind = %job.kind, "Running job");

        match self.run(job).await {
            Ok(Some(result)) => {
                let event = ManagerEvent::new(job.kind.completion_event(), job.correlation_id.clone(), result);
                self.notifier.dispatch(event.clone());
                info!(job_id = %job.id, correlation_id = %job.correlation_id, event = %event.event, "Job completed");
                Ok(Some(event))
            }
            Ok(None) => {
                debug!(correlation_id = %job.correlation_id, "Job payload names no known item kind");
                Ok(None)
            }
            Err(e) => {
                self.report_failure(job, &e);
                Err(e)
            }
        }
    }

    /// Dispatch the completion event of a job that did not finish normally.
    pub fn report_failure(&self, job: &Job, error: &JobError) -> ManagerEvent {
        let response = json!({ "error": { "code": error.code(), "message": error.to_string() } });
        let result = match &job.kind {
            JobKind::Install(request) => failed_install(
                &request.download_link,
                request.target.kind(),
                request.name.clone(),
                response,
            ),
            JobKind::MalformedInstall { download_link, .. } => {
                failed_install(download_link, ItemKind::Plugin, None, response)
            }
            _ => response,
        };

        let event = ManagerEvent::new(job.kind.completion_event(), job.correlation_id.clone(), result);
        self.notifier.dispatch(event.clone());
        warn!(job_id = %job.id, correlation_id = %job.correlation_id, code = error.code(), "Reported failed job");
        event
    }

    async fn run(&self, job: &Job) -> Result<Option<Value>, JobError> {
        match &job.kind {
            JobKind::Update => self.update().await.map(Some),
            JobKind::Install(request) => Ok(Some(self.install(job, request).await)),
            JobKind::MalformedInstall { reason, .. } => Err(JobError::InvalidPayload {
                field: "install".to_string(),
                reason: reason.clone(),
            }),
            JobKind::ManageItem { payload, action } => self.manage(job, payload, *action).await,
        }
    }

    async fn update(&self) -> Result<Value, JobError> {
        let plugins = self.managers.plugins.all().await?;
        let themes = self.managers.themes.all().await?;
        Ok(json!({ "plugins": plugins, "themes": themes }))
    }

    async fn install(&self, job: &Job, request: &InstallRequest) -> Value {
        let kind = request.target.kind();
        let result = match kind {
            ItemKind::Theme => {
                self.managers
                    .themes
                    .install(&request.download_link, request.overwrite)
                    .await
            }
            _ => {
                self.managers
                    .plugins
                    .install(&request.download_link, request.overwrite)
                    .await
            }
        };
        let result = result.with_name(request.name.clone().unwrap_or_else(|| "unknown".to_string()));

        if request.activate && result.success {
            let payload = json!({
                kind.plural(): {
                    result.item.clone(): { "network_wide": false, "silent": true }
                }
            });
            self.follow_up(Job::manage(job.correlation_id.clone(), payload, ItemAction::Activate))
                .await;
        }

        to_value(&result)
    }

    /// Route an item job by payload key: plugins, then themes, then the
    /// upgrade-only kinds.
    async fn manage(&self, job: &Job, payload: &Value, action: ItemAction) -> Result<Option<Value>, JobError> {
        if action == ItemAction::Install {
            return Err(JobError::UnsupportedAction(action));
        }

        let (kind, result) = if let Some(items) = present(payload, ItemKind::Plugin.plural()) {
            (ItemKind::Plugin, self.manage_plugins(items, action).await?)
        } else if let Some(items) = present(payload, ItemKind::Theme.plural())
            .filter(|_| action != ItemAction::Deactivate)
        {
            (ItemKind::Theme, self.manage_themes(items, action).await?)
        } else if action != ItemAction::Upgrade {
            return Ok(None);
        } else if present(payload, ItemKind::Core.plural()).is_some() {
            (ItemKind::Core, to_value(&self.managers.core.upgrade().await))
        } else if present(payload, ItemKind::Translation.plural()).is_some() {
            (ItemKind::Translation, to_value(&self.managers.translations.upgrade().await))
        } else if present(payload, ItemKind::Database.plural()).is_some() {
            (ItemKind::Database, to_value(&self.managers.database.upgrade().await))
        } else {
            return Ok(None);
        };

        if action != ItemAction::Upgrade {
            return Ok(Some(result));
        }

        if kind != ItemKind::Translation && self.settings.upgrade_translations_after_upgrade {
            let payload = json!({ ItemKind::Translation.plural(): "" });
            self.follow_up(Job::manage(job.correlation_id.clone(), payload, ItemAction::Upgrade))
                .await;
        }

        let mut wrapped = Map::new();
        wrapped.insert(kind.plural().to_string(), result);
        Ok(Some(Value::Object(wrapped)))
    }

    async fn manage_plugins(&self, items: &Value, action: ItemAction) -> Result<Value, JobError> {
        let field = ItemKind::Plugin.plural();
        let plugins = &self.managers.plugins;
        let results = match action {
            ItemAction::Activate => plugins.activate(&activation_targets(field, items)?).await,
            ItemAction::Deactivate => plugins.deactivate(&activation_targets(field, items)?).await,
            ItemAction::Upgrade => plugins.upgrade(&identifiers(field, items)?).await,
            ItemAction::Delete => plugins.delete(&identifiers(field, items)?).await,
            ItemAction::Install => return Err(JobError::UnsupportedAction(action)),
        };
        Ok(to_value(&results))
    }

    async fn manage_themes(&self, items: &Value, action: ItemAction) -> Result<Value, JobError> {
        let field = ItemKind::Theme.plural();
        let themes = &self.managers.themes;
        let results = match action {
            ItemAction::Activate => themes.activate(&activation_targets(field, items)?).await,
            ItemAction::Upgrade => themes.upgrade(&identifiers(field, items)?).await,
            ItemAction::Delete => themes.delete(&identifiers(field, items)?).await,
            ItemAction::Deactivate | ItemAction::Install => {
                return Err(JobError::UnsupportedAction(action))
            }
        };
        Ok(to_value(&results))
    }

    async fn follow_up(&self, job: Job) {
        debug!(correlation_id = %job.correlation_id, kind = %job.kind, "Queueing follow-up job");
        if let Err(e) = self.queue.enqueue(job).await {
            warn!("Failed to queue follow-up job: {}", e);
        }
    }
}

fn failed_install(link: &str, kind: ItemKind, name: Option<String>, response: Value) -> Value {
    to_value(&ItemActionResult {
        item: link.to_string(),
        kind: kind.singular().to_string(),
        success: false,
        response,
        name: Some(name.unwrap_or_else(|| "unknown".to_string())),
    })
}

fn to_value<T: Serialize + ?Sized>(result: &T) -> Value {
    serde_json::to_value(result).unwrap_or(Value::Null)
}
