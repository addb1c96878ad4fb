//! In-process job queue drained by a fixed pool of worker tasks.

use super::{EnqueueError, JobOutcome, JobProcessor, JobQueue, JobRequest, JobTicket};
use crate::server::metrics;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct QueuedJob {
    id: Uuid,
    request: JobRequest,
    reply: oneshot::Sender<JobOutcome>,
}

pub struct LocalJobQueue {
    sender: mpsc::Sender<QueuedJob>,
    shutdown: CancellationToken,
    workers: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl LocalJobQueue {
    /// Spawns `concurrency` workers sharing one bounded channel of
    /// `capacity` pending jobs.
    pub fn start(processor: Arc<dyn JobProcessor>, concurrency: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let shutdown = CancellationToken::new();

        let workers = (0..concurrency.max(1))
            .map(|index| {
                tokio::spawn(worker_loop(
                    index,
                    receiver.clone(),
                    processor.clone(),
                    shutdown.child_token(),
                ))
            })
            .collect();
        info!("Started job queue with {} workers", concurrency.max(1));

        Self {
            sender,
            shutdown,
            workers: std::sync::Mutex::new(workers),
        }
    }

    /// Stops accepting work and waits for the workers to exit. Jobs already
    /// being processed run to completion.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let workers = match self.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for worker in workers {
            if let Err(err) = worker.await {
                warn!("Job worker terminated abnormally: {}", err);
            }
        }
    }
}

async fn worker_loop(
    index: usize,
    receiver: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    processor: Arc<dyn JobProcessor>,
    shutdown: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            _ = shutdown.cancelled() => break,
            job = async { receiver.lock().await.recv().await } => job,
        };
        let Some(job) = job else { break };

        let job_type = job.request.job_type();
        debug!("Worker {} processing {} job {}", index, job_type, job.id);
        let started = Instant::now();
        let outcome = processor.process(job.request).await;
        metrics::record_embedding_job(job_type, outcome.status.as_str(), started.elapsed());
        if let Some(message) = &outcome.message {
            debug!("Job {} finished as {}: {}", job.id, outcome.status.as_str(), message);
        }
        // The waiter may have given up already.
        let _ = job.reply.send(outcome);
    }
    debug!("Job worker {} stopped", index);
}

#[async_trait]
impl JobQueue for LocalJobQueue {
    async fn enqueue(&self, request: JobRequest) -> Result<JobTicket, EnqueueError> {
        if self.shutdown.is_cancelled() {
            return Err(EnqueueError::ShutDown);
        }
        let id = Uuid::new_v4();
        let job_type = request.job_type();
        let (reply, outcome) = oneshot::channel();
        self.sender
            .try_send(QueuedJob { id, request, reply })
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => EnqueueError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => EnqueueError::ShutDown,
            })?;
        Ok(JobTicket::new(id, job_type, outcome))
    }
}
