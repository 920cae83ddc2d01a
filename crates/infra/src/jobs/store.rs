//! Job storage.
//!
//! The `JobStore` trait is the durable queue substrate: any backend works as
//! long as it preserves FIFO claim order and at-least-once delivery with
//! bounded retries. The in-memory implementation backs tests and dev.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use super::types::{Job, JobId, JobStatus};

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Counts per job status.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct JobStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub exhausted: usize,
    pub discarded: usize,
}

/// Durable job queue abstraction.
pub trait JobStore: Send + Sync {
    /// Durably record a new job. Returns immediately; execution happens
    /// later on the worker.
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError>;

    /// Get a job by ID.
    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError>;

    /// Write back an updated job.
    fn update(&self, job: &Job) -> Result<(), JobStoreError>;

    /// Claim the next runnable job (pending, or failed with its backoff
    /// elapsed), FIFO by enqueue order. Marks it running.
    fn claim_next(&self) -> Result<Option<Job>, JobStoreError>;

    /// List jobs by status discriminant (or all, oldest first).
    fn list_by_status(
        &self,
        status: Option<&JobStatus>,
        limit: usize,
    ) -> Result<Vec<Job>, JobStoreError>;

    /// Queue statistics.
    fn stats(&self) -> Result<JobStats, JobStoreError>;
}

impl<S> JobStore for Arc<S>
where
    S: JobStore + ?Sized,
{
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError> {
        (**self).enqueue(job)
    }

    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        (**self).get(job_id)
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        (**self).update(job)
    }

    fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        (**self).claim_next()
    }

    fn list_by_status(
        &self,
        status: Option<&JobStatus>,
        limit: usize,
    ) -> Result<Vec<Job>, JobStoreError> {
        (**self).list_by_status(status, limit)
    }

    fn stats(&self) -> Result<JobStats, JobStoreError> {
        (**self).stats()
    }
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<JobId, Job>>, JobStoreError> {
        self.jobs
            .read()
            .map_err(|e| JobStoreError::Storage(e.to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<JobId, Job>>, JobStoreError> {
        self.jobs
            .write()
            .map_err(|e| JobStoreError::Storage(e.to_string()))
    }
}

/// FIFO key: creation time, with the time-ordered id as tiebreak for jobs
/// enqueued within the same instant.
fn fifo_key(job: &Job) -> (chrono::DateTime<chrono::Utc>, Uuid) {
    (job.created_at, job.id.0)
}

impl JobStore for InMemoryJobStore {
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError> {
        let mut jobs = self.write()?;
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        Ok(self.read()?.get(&job_id).cloned())
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        let mut jobs = self.write()?;
        if !jobs.contains_key(&job.id) {
            return Err(JobStoreError::NotFound(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        let mut jobs = self.write()?;

        let next_id = jobs
            .values()
            .filter(|j| {
                matches!(j.status, JobStatus::Pending | JobStatus::Failed { .. }) && j.is_ready()
            })
            .min_by_key(|j| fifo_key(j))
            .map(|j| j.id);

        if let Some(id) = next_id {
            if let Some(job) = jobs.get_mut(&id) {
                job.mark_running();
                return Ok(Some(job.clone()));
            }
        }

        Ok(None)
    }

    fn list_by_status(
        &self,
        status: Option<&JobStatus>,
        limit: usize,
    ) -> Result<Vec<Job>, JobStoreError> {
        let jobs = self.read()?;
        let mut result: Vec<Job> = jobs
            .values()
            .filter(|j| {
                status.map_or(true, |s| {
                    std::mem::discriminant(&j.status) == std::mem::discriminant(s)
                })
            })
            .cloned()
            .collect();

        result.sort_by_key(fifo_key);
        result.truncate(limit);
        Ok(result)
    }

    fn stats(&self) -> Result<JobStats, JobStoreError> {
        let jobs = self.read()?;
        let mut stats = JobStats::default();
        for job in jobs.values() {
            match &job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed { .. } => stats.failed += 1,
                JobStatus::Exhausted { .. } => stats.exhausted += 1,
                JobStatus::Discarded { .. } => stats.discarded += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::JobTask;
    use chrono::Utc;

    fn delete_job(url: &str) -> Job {
        Job::for_task(&JobTask::DeleteFile {
            url: url.to_string(),
        })
        .unwrap()
    }

    #[test]
    fn enqueue_and_claim_marks_running() {
        let store = InMemoryJobStore::new();
        let id = store.enqueue(delete_job("https://img.test/a.png")).unwrap();

        let claimed = store.claim_next().unwrap().unwrap();
        assert_eq!(claimed.id, id);
        assert!(matches!(claimed.status, JobStatus::Running));
        assert_eq!(claimed.attempt, 1);

        // Nothing else to claim.
        assert!(store.claim_next().unwrap().is_none());
    }

    #[test]
    fn claim_order_is_fifo() {
        let store = InMemoryJobStore::new();
        let first = store.enqueue(delete_job("https://img.test/1.png")).unwrap();
        let second = store.enqueue(delete_job("https://img.test/2.png")).unwrap();
        let third = store.enqueue(delete_job("https://img.test/3.png")).unwrap();

        assert_eq!(store.claim_next().unwrap().unwrap().id, first);
        assert_eq!(store.claim_next().unwrap().unwrap().id, second);
        assert_eq!(store.claim_next().unwrap().unwrap().id, third);
    }

    #[test]
    fn backed_off_job_is_not_claimable_until_ready() {
        let store = InMemoryJobStore::new();
        store.enqueue(delete_job("https://img.test/a.png")).unwrap();

        let mut job = store.claim_next().unwrap().unwrap();
        job.mark_failed("transient".to_string(), Utc::now());
        store.update(&job).unwrap();

        // Still inside the 5s backoff window.
        assert!(store.claim_next().unwrap().is_none());

        // Clear the backoff and it becomes claimable again.
        job.scheduled_at = None;
        store.update(&job).unwrap();
        let reclaimed = store.claim_next().unwrap().unwrap();
        assert_eq!(reclaimed.id, job.id);
        assert_eq!(reclaimed.attempt, 2);
    }

    #[test]
    fn exhausted_jobs_stay_in_the_store() {
        let store = InMemoryJobStore::new();
        let id = store.enqueue(delete_job("https://img.test/a.png")).unwrap();

        let mut job = store.claim_next().unwrap().unwrap();
        job.retry_policy = crate::jobs::RetryPolicy::fixed(1, std::time::Duration::ZERO);
        job.mark_failed("fatal".to_string(), Utc::now());
        store.update(&job).unwrap();

        assert!(matches!(
            store.get(id).unwrap().unwrap().status,
            JobStatus::Exhausted { .. }
        ));
        assert!(store.claim_next().unwrap().is_none());
        assert_eq!(store.stats().unwrap().exhausted, 1);
    }

    #[test]
    fn stats_and_listing_by_status() {
        let store = InMemoryJobStore::new();
        for i in 0..4 {
            store
                .enqueue(delete_job(&format!("https://img.test/{i}.png")))
                .unwrap();
        }
        store.claim_next().unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.pending, 3);
        assert_eq!(stats.running, 1);

        let pending = store
            .list_by_status(Some(&JobStatus::Pending), 10)
            .unwrap();
        assert_eq!(pending.len(), 3);

        let all = store.list_by_status(None, 2).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn duplicate_enqueue_is_rejected() {
        let store = InMemoryJobStore::new();
        let job = delete_job("https://img.test/a.png");
        store.enqueue(job.clone()).unwrap();
        assert!(matches!(
            store.enqueue(job),
            Err(JobStoreError::AlreadyExists(_))
        ));
    }
}
