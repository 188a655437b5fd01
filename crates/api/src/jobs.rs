use dashmap::DashMap;
use serde::Serialize;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const DEFAULT_JOB_RETENTION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job_id: Uuid,
    pub status: JobState,
    /// 0 to 100.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    finished_at: Option<Instant>,
}

/// Background indexing jobs, kept in memory.
///
/// Finished jobs stay visible for `retention`, then are evicted the next time
/// a job is created or `prune` runs. Pending and running jobs are never evicted.
pub struct JobRegistry {
    jobs: DashMap<Uuid, JobStatus>,
    retention: Duration,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_retention(DEFAULT_JOB_RETENTION)
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            jobs: DashMap::new(),
            retention,
        }
    }

    pub fn create(&self) -> Uuid {
        self.prune();

        let job_id = Uuid::new_v4();
        self.jobs.insert(
            job_id,
            JobStatus {
                job_id,
                status: JobState::Pending,
                progress: 0,
                message: None,
                finished_at: None,
            },
        );
        job_id
    }

    pub fn mark_running(&self, job_id: Uuid) {
        self.update(job_id, JobState::Running, 10, None);
    }

    pub fn complete(&self, job_id: Uuid, message: impl Into<String>) {
        self.update(job_id, JobState::Completed, 100, Some(message.into()));
    }

    pub fn fail(&self, job_id: Uuid, message: impl Into<String>) {
        self.update(job_id, JobState::Failed, 100, Some(message.into()));
    }

    pub fn get(&self, job_id: Uuid) -> Option<JobStatus> {
        self.jobs.get(&job_id).map(|entry| entry.value().clone())
    }

    /// Drop finished jobs older than the retention window.
    pub fn prune(&self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, job| {
            job.finished_at
                .is_none_or(|finished| finished.elapsed() < self.retention)
        });
        let evicted = before.saturating_sub(self.jobs.len());
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted finished jobs");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn update(&self, job_id: Uuid, status: JobState, progress: u8, message: Option<String>) {
        if let Some(mut job) = self.jobs.get_mut(&job_id) {
            // Terminal states stick.
            if job.status.is_terminal() {
                return;
            }
            job.status = status;
            job.progress = progress;
            if message.is_some() {
                job.message = message;
            }
            if status.is_terminal() {
                job.finished_at = Some(Instant::now());
            }
        }
    }
}
