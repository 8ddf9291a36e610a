//! Job queue seam and the in-process channel implementation.

use crate::jobs::Job;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Job queue is closed")]
    Closed,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<(), QueueError>;
}

/// Bounded in-process queue feeding a single [`JobWorker`](crate::worker::JobWorker).
///
/// `enqueue` never waits on the worker: when the buffer is full the handoff
/// continues on a background task. Jobs enqueued by a running job therefore
/// cannot deadlock the worker.
#[derive(Clone)]
pub struct ChannelQueue {
    tx: mpsc::Sender<Job>,
}

pub type JobReceiver = mpsc::Receiver<Job>;

impl ChannelQueue {
    pub fn bounded(capacity: usize) -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl JobQueue for ChannelQueue {
    async fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        debug!(job_id = %job.id, correlation_id = %job.correlation_id, kind = %job.kind, "Enqueueing job");

        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(QueueError::Closed),
            Err(mpsc::error::TrySendError::Full(job)) => {
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let id = job.id;
                    if tx.send(job).await.is_err() {
                        warn!(job_id = %id, "Job queue closed before a deferred job was handed off");
                    }
                });
                Ok(())
            }
        }
    }
}
