//! Single consumer draining the job queue.

use crate::executor::JobExecutor;
use crate::jobs::{Job, JobError};
use crate::queue::JobReceiver;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use foreman_core::panic_message;
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

const MAX_HISTORY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
    /// Ran, but the payload named nothing to act on.
    Skipped,
    Failed(String),
}

/// Outcome of a finished job.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub correlation_id: String,
    pub kind: String,
    pub status: JobStatus,
    pub finished_at: DateTime<Utc>,
}

pub type JobHistory = Arc<DashMap<Uuid, JobRecord>>;

pub struct JobWorker {
    rx: JobReceiver,
    executor: Arc<JobExecutor>,
    history: JobHistory,
}

impl JobWorker {
    pub fn new(rx: JobReceiver, executor: Arc<JobExecutor>, history: JobHistory) -> Self {
        Self {
            rx,
            executor,
            history,
        }
    }

    /// Consume jobs one at a time until every queue handle is dropped.
    pub async fn run(mut self) {
        info!("Job worker started");
        while let Some(job) = self.rx.recv().await {
            self.process(&job).await;
        }
        info!("Job worker stopped: queue closed");
    }

    /// Execute one job and record its outcome. Failed jobs are reported
    /// through their completion event and not retried.
    pub async fn process(&self, job: &Job) -> JobRecord {
        let outcome = match AssertUnwindSafe(self.executor.execute(job)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                let e = JobError::Panicked(panic_message(payload.as_ref()));
                self.executor.report_failure(job, &e);
                Err(e)
            }
        };

        let status = match outcome {
            Ok(Some(_)) => JobStatus::Completed,
            Ok(None) => JobStatus::Skipped,
            Err(e) => {
                error!(job_id = %job.id, correlation_id = %job.correlation_id, kind = %job.kind, "Job failed: {}", e);
                JobStatus::Failed(e.to_string())
            }
        };

        let record = JobRecord {
            id: job.id,
            correlation_id: job.correlation_id.clone(),
            kind: job.kind.to_string(),
            status,
            finished_at: Utc::now(),
        };
        self.remember(record.clone());
        record
    }

    fn remember(&self, record: JobRecord) {
        if self.history.len() >= MAX_HISTORY {
            let oldest = self
                .history
                .iter()
                .min_by_key(|entry| entry.finished_at)
                .map(|entry| *entry.key());
            if let Some(id) = oldest {
                self.history.remove(&id);
            }
        }
        self.history.insert(record.id, record);
    }
}
