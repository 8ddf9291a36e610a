//! External services reached by synchronous commands.
//!
//! These are opaque to the agent, so they report failures as `anyhow` errors.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

#[async_trait]
pub trait LoginHook: Send + Sync {
    async fn login(&self, payload: &Value) -> Result<()>;
}

#[async_trait]
pub trait ServerInfo: Send + Sync {
    async fn information(&self) -> Result<Value>;

    /// Run the health check and report it out of band.
    async fn health_check(&self) -> Result<()>;
}

#[async_trait]
pub trait BackupService: Send + Sync {
    async fn directory_tree(&self, payload: &Value) -> Result<Value>;

    async fn information(&self) -> Result<Value>;

    async fn make(&self, correlation_id: &str, payload: &Value) -> Result<()>;

    async fn remove(&self, name: Option<&str>) -> Result<()>;
}

/// Nudges the job queue runner when the management service reports it idle.
#[async_trait]
pub trait QueueHealth: Send + Sync {
    async fn kick(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct Collaborators {
    pub login: Arc<dyn LoginHook>,
    pub server: Arc<dyn ServerInfo>,
    pub backups: Arc<dyn BackupService>,
    pub queue_health: Arc<dyn QueueHealth>,
}
