//! Wiring of managers, queue, executor and dispatcher.

use crate::collaborators::Collaborators;
use crate::dispatcher::{CommandDispatcher, DispatchError};
use crate::executor::{ExecutorSettings, JobExecutor, Managers};
use crate::notifier::BroadcastNotifier;
use crate::protocol::{CommandEnvelope, DispatchResponse, ManagerEvent};
use crate::queue::{ChannelQueue, JobQueue, JobReceiver};
use crate::worker::{JobHistory, JobWorker};
use dashmap::DashMap;
use foreman_config::{AgentConfig, ConfigError};
use foreman_core::{
    CoreHost, CoreManager, DatabaseHost, DatabaseManager, DumpStrategy, FallbackDump,
    InProcessDumper, PluginHost, PluginManager, ShellDumper, ThemeHost, ThemeManager,
    TransientCache, TranslationHost, TranslationManager, WhiteLabelService, WhiteLabelSource,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

/// Host adapters the agent drives.
#[derive(Clone)]
pub struct AgentHosts {
    pub plugins: Arc<dyn PluginHost>,
    pub themes: Arc<dyn ThemeHost>,
    pub core: Arc<dyn CoreHost>,
    pub translations: Arc<dyn TranslationHost>,
    pub database: Arc<dyn DatabaseHost>,
    pub white_label: Arc<dyn WhiteLabelSource>,
    pub cache: Arc<dyn TransientCache>,
}

pub struct Agent {
    dispatcher: CommandDispatcher,
    executor: Arc<JobExecutor>,
    notifier: Arc<BroadcastNotifier>,
    managers: Managers,
    receiver: Option<JobReceiver>,
    history: JobHistory,
}

impl Agent {
    pub fn new(
        config: &AgentConfig,
        hosts: AgentHosts,
        collaborators: Collaborators,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let update_ttl = config.cache.update_ttl();
        let fallback: Arc<dyn DumpStrategy> = Arc::new(InProcessDumper::new(hosts.database.clone()));
        let preferred = config.database.shell_dump.then(|| {
            Arc::new(ShellDumper::new(
                config.database.mysqldump_path.clone(),
                hosts.database.clone(),
            )) as Arc<dyn DumpStrategy>
        });

        let managers = Managers {
            plugins: Arc::new(PluginManager::new(hosts.plugins, hosts.cache.clone(), update_ttl)),
            themes: Arc::new(ThemeManager::new(hosts.themes, hosts.cache.clone(), update_ttl)),
            core: Arc::new(CoreManager::new(hosts.core)),
            translations: Arc::new(TranslationManager::new(hosts.translations)),
            database: Arc::new(DatabaseManager::new(
                hosts.database,
                FallbackDump::new(preferred, fallback),
            )),
        };
        let white_label = Arc::new(WhiteLabelService::new(
            hosts.white_label,
            hosts.cache,
            config.cache.white_label_ttl(),
        ));

        let (queue, receiver) = ChannelQueue::bounded(config.queue.capacity);
        let queue: Arc<dyn JobQueue> = Arc::new(queue);
        let notifier = Arc::new(BroadcastNotifier::new(config.queue.capacity));

        let executor = Arc::new(JobExecutor::new(
            managers.clone(),
            queue.clone(),
            notifier.clone(),
            ExecutorSettings {
                upgrade_translations_after_upgrade: config.jobs.upgrade_translations_after_upgrade,
            },
        ));
        let dispatcher = CommandDispatcher::new(
            queue,
            managers.database.clone(),
            white_label,
            collaborators,
        );

        info!(
            queue_capacity = config.queue.capacity,
            shell_dump = config.database.shell_dump,
            "Agent initialised"
        );

        Ok(Self {
            dispatcher,
            executor,
            notifier,
            managers,
            receiver: Some(receiver),
            history: Arc::new(DashMap::new()),
        })
    }

    pub async fn handle(&self, envelope: CommandEnvelope) -> Result<DispatchResponse, DispatchError> {
        self.dispatcher.dispatch(envelope).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.notifier.subscribe()
    }

    /// Start the job worker. Only the first call spawns one.
    pub fn spawn_worker(&mut self) -> Option<JoinHandle<()>> {
        let receiver = self.receiver.take()?;
        let worker = JobWorker::new(receiver, self.executor.clone(), self.history.clone());
        Some(tokio::spawn(worker.run()))
    }

    /// Outcomes of finished jobs.
    pub fn history(&self) -> JobHistory {
        self.history.clone()
    }

    pub fn managers(&self) -> &Managers {
        &self.managers
    }
}
