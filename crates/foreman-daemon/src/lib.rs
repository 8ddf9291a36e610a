//! Foreman agent daemon.
//!
//! Accepts decoded management commands, acknowledges mutating ones at once
//! and runs them as background jobs whose completion is broadcast as
//! [`ManagerEvent`]s carrying the command's correlation id.

pub mod agent;
pub mod collaborators;
pub mod dispatcher;
pub mod executor;
pub mod jobs;
pub mod logging;
pub mod notifier;
pub mod protocol;
pub mod queue;
pub mod worker;

pub use agent::{Agent, AgentHosts};
pub use collaborators::{BackupService, Collaborators, LoginHook, QueueHealth, ServerInfo};
pub use dispatcher::{handler_name, CommandDispatcher, CommandKind, DispatchError};
pub use executor::{ExecutorSettings, JobExecutor, Managers};
pub use jobs::{InstallRequest, InstallTarget, Job, JobError, JobKind};
pub use notifier::{BroadcastNotifier, Notifier};
pub use protocol::{CommandEnvelope, DispatchResponse, EventKind, ManagerEvent};
pub use queue::{ChannelQueue, JobQueue, JobReceiver, QueueError};
pub use worker::{JobHistory, JobRecord, JobStatus, JobWorker};
