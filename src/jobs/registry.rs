use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::PublishResult;

/// Finished records kept before the oldest are evicted.
pub const DEFAULT_RETAINED_JOBS: usize = 1000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// Validate that a job status transition is valid.
pub fn is_valid_transition(from: &JobStatus, to: &JobStatus) -> bool {
    matches!(
        (from, to),
        (JobStatus::Queued, JobStatus::Running)
            | (JobStatus::Running, JobStatus::Completed)
            | (JobStatus::Running, JobStatus::Failed)
    )
}

/// Observable state of one deferred task request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub id: Uuid,
    pub task: String,
    pub round: u32,
    pub status: JobStatus,
    pub result: Option<PublishResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn queued(task: &str, round: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            task: task.to_string(),
            round,
            status: JobStatus::Queued,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

struct RegistryState {
    jobs: HashMap<Uuid, JobRecord>,
    /// Finished job ids, oldest first
    finished: VecDeque<Uuid>,
    retain: usize,
}

/// Shared, bounded store of job records.
#[derive(Clone)]
pub struct JobRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETAINED_JOBS)
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retain: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState {
                jobs: HashMap::new(),
                finished: VecDeque::new(),
                retain,
            })),
        }
    }

    pub async fn insert(&self, record: JobRecord) {
        self.state.write().await.jobs.insert(record.id, record);
    }

    pub async fn get(&self, id: &Uuid) -> Option<JobRecord> {
        self.state.read().await.jobs.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.jobs.len()
    }

    pub async fn mark_running(&self, id: &Uuid) -> bool {
        self.transition(id, JobStatus::Running, None, None).await
    }

    pub async fn mark_completed(&self, id: &Uuid, result: PublishResult) -> bool {
        self.transition(id, JobStatus::Completed, Some(result), None).await
    }

    pub async fn mark_failed(&self, id: &Uuid, error: String) -> bool {
        self.transition(id, JobStatus::Failed, None, Some(error)).await
    }

    /// Apply a status change. Returns false for unknown ids and invalid transitions.
    async fn transition(
        &self,
        id: &Uuid,
        to: JobStatus,
        result: Option<PublishResult>,
        error: Option<String>,
    ) -> bool {
        let mut state = self.state.write().await;
        let Some(record) = state.jobs.get_mut(id) else {
            return false;
        };
        if !is_valid_transition(&record.status, &to) {
            tracing::warn!(job_id = %id, from = record.status.as_str(), to = to.as_str(), "rejected job status transition");
            return false;
        }
        record.status = to;
        record.updated_at = Utc::now();
        if result.is_some() {
            record.result = result;
        }
        if error.is_some() {
            record.error = error;
        }

        if to.is_finished() {
            state.finished.push_back(*id);
            while state.finished.len() > state.retain {
                if let Some(evicted) = state.finished.pop_front() {
                    state.jobs.remove(&evicted);
                }
            }
        }
        true
    }
}
