#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use foreman_config::AgentConfig;
use foreman_core::test_support::{
    MemoryCoreHost, MemoryDatabaseHost, MemoryPluginHost, MemoryThemeHost, MemoryTranslationHost,
    MemoryWhiteLabelSource,
};
use foreman_core::{
    CoreManager, DatabaseManager, FallbackDump, InProcessDumper, MemoryTransientCache,
    PluginManager, ThemeManager, TranslationManager,
};
use foreman_daemon::{
    Agent, AgentHosts, BackupService, BroadcastNotifier, ChannelQueue, Collaborators,
    ExecutorSettings, JobExecutor, JobReceiver, LoginHook, ManagerEvent, Managers, QueueHealth,
    ServerInfo,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// In-memory hosts shared by the executor and agent fixtures.
pub struct Hosts {
    pub plugins: Arc<MemoryPluginHost>,
    pub themes: Arc<MemoryThemeHost>,
    pub core: Arc<MemoryCoreHost>,
    pub translations: Arc<MemoryTranslationHost>,
    pub database: Arc<MemoryDatabaseHost>,
    pub white_label: Arc<MemoryWhiteLabelSource>,
    pub cache: Arc<MemoryTransientCache>,
}

impl Hosts {
    pub fn new() -> Self {
        Self {
            plugins: Arc::new(MemoryPluginHost::new()),
            themes: Arc::new(MemoryThemeHost::new()),
            core: Arc::new(MemoryCoreHost::succeeding()),
            translations: Arc::new(MemoryTranslationHost::succeeding()),
            database: Arc::new(MemoryDatabaseHost::new("site", "wp_")),
            white_label: Arc::new(MemoryWhiteLabelSource::returning(json!({"name": "Acme"}))),
            cache: Arc::new(MemoryTransientCache::new()),
        }
    }

    pub fn agent_hosts(&self) -> AgentHosts {
        AgentHosts {
            plugins: self.plugins.clone(),
            themes: self.themes.clone(),
            core: self.core.clone(),
            translations: self.translations.clone(),
            database: self.database.clone(),
            white_label: self.white_label.clone(),
            cache: self.cache.clone(),
        }
    }

    pub fn managers(&self) -> Managers {
        let ttl = Duration::from_secs(60);
        Managers {
            plugins: Arc::new(PluginManager::new(self.plugins.clone(), self.cache.clone(), ttl)),
            themes: Arc::new(ThemeManager::new(self.themes.clone(), self.cache.clone(), ttl)),
            core: Arc::new(CoreManager::new(self.core.clone())),
            translations: Arc::new(TranslationManager::new(self.translations.clone())),
            database: Arc::new(DatabaseManager::new(
                self.database.clone(),
                FallbackDump::new(None, Arc::new(InProcessDumper::new(self.database.clone()))),
            )),
        }
    }
}

/// Executor wired to a queue whose receiving end the test holds, so
/// follow-up jobs can be inspected instead of run.
pub struct ExecutorFixture {
    pub hosts: Hosts,
    pub executor: JobExecutor,
    pub follow_ups: JobReceiver,
    pub events: broadcast::Receiver<ManagerEvent>,
}

impl ExecutorFixture {
    pub fn new() -> Self {
        Self::with_settings(Hosts::new(), ExecutorSettings::default())
    }

    pub fn with_settings(hosts: Hosts, settings: ExecutorSettings) -> Self {
        let (queue, follow_ups) = ChannelQueue::bounded(16);
        let notifier = Arc::new(BroadcastNotifier::new(16));
        let events = notifier.subscribe();
        let executor = JobExecutor::new(hosts.managers(), Arc::new(queue), notifier, settings);
        Self {
            hosts,
            executor,
            follow_ups,
            events,
        }
    }
}

/// Collaborators that report every call on a channel.
pub struct RecordingCollaborators {
    calls: mpsc::UnboundedSender<String>,
}

impl RecordingCollaborators {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (calls, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { calls }), rx)
    }

    fn record(&self, call: String) {
        let _ = self.calls.send(call);
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            login: self.clone(),
            server: self.clone(),
            backups: self.clone(),
            queue_health: self.clone(),
        }
    }
}

#[async_trait]
impl LoginHook for RecordingCollaborators {
    async fn login(&self, payload: &Value) -> Result<()> {
        self.record(format!("login:{}", payload));
        Ok(())
    }
}

#[async_trait]
impl ServerInfo for RecordingCollaborators {
    async fn information(&self) -> Result<Value> {
        self.record("server_information".to_string());
        Ok(json!({"php": "8.2.0", "server": "nginx"}))
    }

    async fn health_check(&self) -> Result<()> {
        self.record("server_health".to_string());
        Ok(())
    }
}

#[async_trait]
impl BackupService for RecordingCollaborators {
    async fn directory_tree(&self, payload: &Value) -> Result<Value> {
        self.record("directory_tree".to_string());
        Ok(json!({"root": payload.get("path").cloned().unwrap_or(Value::Null), "children": []}))
    }

    async fn information(&self) -> Result<Value> {
        self.record("backup_information".to_string());
        Ok(json!({"backups": []}))
    }

    async fn make(&self, correlation_id: &str, _payload: &Value) -> Result<()> {
        self.record(format!("backup_make:{}", correlation_id));
        anyhow::bail!("disk full")
    }

    async fn remove(&self, name: Option<&str>) -> Result<()> {
        self.record(format!("backup_remove:{}", name.unwrap_or("-")));
        Ok(())
    }
}

#[async_trait]
impl QueueHealth for RecordingCollaborators {
    async fn kick(&self) -> Result<()> {
        self.record("queue_kick".to_string());
        Ok(())
    }
}

pub struct AgentFixture {
    pub hosts: Hosts,
    pub agent: Agent,
    pub calls: mpsc::UnboundedReceiver<String>,
}

impl AgentFixture {
    pub fn new() -> Self {
        let mut config = AgentConfig::default();
        config.database.shell_dump = false;
        config.queue.capacity = 16;
        Self::with_config(&config)
    }

    pub fn with_config(config: &AgentConfig) -> Self {
        let hosts = Hosts::new();
        let (collaborators, calls) = RecordingCollaborators::new();
        let agent = Agent::new(config, hosts.agent_hosts(), collaborators.collaborators())
            .expect("valid test config");
        Self { hosts, agent, calls }
    }

    pub async fn next_call(&mut self) -> String {
        tokio::time::timeout(TIMEOUT, self.calls.recv())
            .await
            .expect("collaborator call within timeout")
            .expect("collaborator channel open")
    }
}

pub async fn next_event(events: &mut broadcast::Receiver<ManagerEvent>) -> ManagerEvent {
    tokio::time::timeout(TIMEOUT, events.recv())
        .await
        .expect("event within timeout")
        .expect("event channel open")
}
