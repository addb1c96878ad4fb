//! Embedding job queue.
//!
//! Requests that need a vector (free-text search, taste vectors) enqueue a
//! [`JobRequest`] and wait on the returned [`JobTicket`] with an explicit
//! timeout. Re-embedding requests share the same queue and are usually
//! fire-and-forget.

mod embedder;
mod queue;
mod single_flight;
mod taste_profile;
mod worker;

pub use embedder::{DisabledEmbedder, HttpTextEmbedder, TextEmbedder};
pub use queue::LocalJobQueue;
pub use single_flight::SingleFlight;
pub use taste_profile::{TasteProfileBuilder, TasteProfileSettings, TasteVectors};
pub use worker::EmbeddingWorker;

use crate::catalog_store::{Embedding, ReembedTarget};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum JobRequest {
    /// Free text to a meta-space vector.
    SearchQuery { text: String },
    /// Listener id to a taste-vector pair. `recent` narrows the history to
    /// the last few interactions.
    ForYou { listener_id: String, recent: bool },
    /// Recompute and store an entity's embedding. Sent fire-and-forget by
    /// whatever writes the catalog (ingestion, playlist edits) through the
    /// same queue; the read paths here never enqueue it.
    Reembed { target: ReembedTarget, id: String },
}

impl JobRequest {
    pub fn job_type(&self) -> &'static str {
        match self {
            JobRequest::SearchQuery { .. } => "search_query",
            JobRequest::ForYou { .. } => "for_you",
            JobRequest::Reembed { target, .. } => target.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Done,
    Error,
    Unsupported,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Done => "done",
            JobStatus::Error => "error",
            JobStatus::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobData {
    None,
    Vector(Embedding),
    Taste(TasteVectors),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub data: JobData,
    pub message: Option<String>,
}

impl JobOutcome {
    pub fn done(data: JobData) -> Self {
        Self {
            status: JobStatus::Done,
            data,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Error,
            data: JobData::None,
            message: Some(message.into()),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Unsupported,
            data: JobData::None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error("job queue is full")]
    QueueFull,
    #[error("job queue is shut down")]
    ShutDown,
}

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("job did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("job was dropped before finishing")]
    Dropped,
}

/// Handle on an enqueued job. Dropping it does not cancel the job.
pub struct JobTicket {
    pub id: Uuid,
    pub job_type: &'static str,
    outcome: oneshot::Receiver<JobOutcome>,
}

impl JobTicket {
    pub(crate) fn new(
        id: Uuid,
        job_type: &'static str,
        outcome: oneshot::Receiver<JobOutcome>,
    ) -> Self {
        Self {
            id,
            job_type,
            outcome,
        }
    }

    /// Waits for the job, giving up after `timeout`.
    pub async fn wait_until_finished(self, timeout: Duration) -> Result<JobOutcome, WaitError> {
        match tokio::time::timeout(timeout, self.outcome).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Err(WaitError::Dropped),
            Err(_) => Err(WaitError::TimedOut(timeout)),
        }
    }
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, request: JobRequest) -> Result<JobTicket, EnqueueError>;
}

/// Executes one job. Failures are reported through the outcome status.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, request: JobRequest) -> JobOutcome;
}
