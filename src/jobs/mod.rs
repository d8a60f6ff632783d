//! Deferred execution: a bounded queue of task requests drained by a fixed
//! pool of workers. Every accepted request gets a [`JobRecord`] that moves
//! `queued -> running -> completed | failed`.

pub mod registry;

pub use registry::{JobRecord, JobRegistry, JobStatus};

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::errors::JobError;
use crate::models::TaskRequest;
use crate::pipeline::PublishRunner;

struct Job {
    id: Uuid,
    request: TaskRequest,
}

/// Submission handle. Cloneable; the queue closes once every handle drops.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<Job>,
    registry: JobRegistry,
    capacity: usize,
}

/// Worker task handles, joined on shutdown.
pub struct JobWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl JobQueue {
    /// Spawn `workers` workers draining a queue of `capacity` pending jobs.
    pub fn start(runner: Arc<dyn PublishRunner>, workers: usize, capacity: usize) -> (Self, JobWorkers) {
        Self::start_with_registry(runner, workers, capacity, JobRegistry::new())
    }

    pub fn start_with_registry(
        runner: Arc<dyn PublishRunner>,
        workers: usize,
        capacity: usize,
        registry: JobRegistry,
    ) -> (Self, JobWorkers) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..workers.max(1))
            .map(|worker| {
                tokio::spawn(work(
                    worker,
                    receiver.clone(),
                    runner.clone(),
                    registry.clone(),
                ))
            })
            .collect();

        let queue = Self {
            sender,
            registry,
            capacity,
        };
        (queue, JobWorkers { handles })
    }

    /// Accept a request for later execution. Never waits for queue space.
    pub async fn submit(&self, request: TaskRequest) -> Result<Uuid, JobError> {
        let permit = self.sender.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => JobError::QueueFull {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(()) => JobError::QueueClosed,
        })?;

        let record = JobRecord::queued(&request.task, request.round);
        let id = record.id;
        self.registry.insert(record).await;
        permit.send(Job { id, request });

        tracing::info!(job_id = %id, "job queued");
        Ok(id)
    }

    pub async fn get(&self, id: &Uuid) -> Option<JobRecord> {
        self.registry.get(id).await
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }
}

impl JobWorkers {
    /// Wait for every worker to exit. Workers exit once all queue handles
    /// have dropped and the queued jobs have run.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "job worker panicked");
            }
        }
    }
}

async fn work(
    worker: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    runner: Arc<dyn PublishRunner>,
    registry: JobRegistry,
) {
    loop {
        let job = receiver.lock().await.recv().await;
        let Some(Job { id, request }) = job else {
            break;
        };

        let task = request.task.clone();
        let round = request.round;
        registry.mark_running(&id).await;
        tracing::info!(worker, job_id = %id, task = %task, round, "job started");

        // A panicking run fails its job; the worker keeps draining
        let run = tokio::spawn({
            let runner = runner.clone();
            async move { runner.run(request).await }
        });
        match run.await {
            Ok(Ok(result)) => {
                tracing::info!(worker, job_id = %id, task = %task, commit_sha = %result.commit_sha, "job completed");
                registry.mark_completed(&id, result).await;
            }
            Ok(Err(e)) => {
                tracing::warn!(worker, job_id = %id, task = %task, stage = e.stage(), error = %e, "job failed");
                registry.mark_failed(&id, e.to_string()).await;
            }
            Err(e) => {
                tracing::error!(worker, job_id = %id, task = %task, error = %e, "job panicked");
                registry.mark_failed(&id, format!("Pipeline task failed: {}", e)).await;
            }
        }
    }
    tracing::debug!(worker, "job worker stopped");
}
