//! Core job types and the retry policy.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use brandhub_brands::Brand;

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The unit of asynchronous work, dispatched by exhaustive match.
///
/// Payloads are fully self-contained: `UploadFile` carries the brand
/// snapshot taken at enqueue time, so execution never re-reads mutable
/// state it did not capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task_type", content = "payload", rename_all = "camelCase")]
pub enum JobTask {
    /// Read the spooled upload from disk, push it to the image host, delete
    /// the temp file, and write the returned URL onto the brand.
    UploadFile {
        brand: Brand,
        tmp_path: PathBuf,
        folder: String,
    },
    /// Delete a remote image by URL. No brand mutation.
    DeleteFile { url: String },
}

impl JobTask {
    /// Task tag as persisted, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            JobTask::UploadFile { .. } => "uploadFile",
            JobTask::DeleteFile { .. } => "deleteFile",
        }
    }
}

/// Job execution status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Queued, waiting to be picked up.
    Pending,
    /// Currently being executed.
    Running,
    /// Completed successfully.
    Completed,
    /// Failed, will be retried after the backoff delay.
    Failed { error: String, attempt: u32 },
    /// Retries exhausted; kept in the store as the failure record.
    Exhausted { error: String, attempts: u32 },
    /// Payload could not be interpreted; dropped without retry.
    Discarded { reason: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Exhausted { .. } | JobStatus::Discarded { .. }
        )
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, JobStatus::Failed { .. })
    }
}

/// Retry policy: bounded attempts with a fixed delay between them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of execution attempts (including the first).
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Whether another attempt is allowed after `attempt` attempts have run.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Record of one execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAttemptRecord {
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
}

/// A durable background job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Serialized `JobTask`; parsed at execution time so the store never
    /// rejects a payload it merely transports.
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub retry_policy: RetryPolicy,
    /// Attempts started so far.
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the job may next run (set by the backoff after a failure).
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Errors from previous attempts.
    pub history: Vec<JobAttemptRecord>,
}

impl Job {
    pub fn new(payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            payload,
            status: JobStatus::Pending,
            retry_policy: RetryPolicy::default(),
            attempt: 0,
            created_at: now,
            updated_at: now,
            scheduled_at: None,
            history: Vec::new(),
        }
    }

    /// Build a job from a typed task.
    pub fn for_task(task: &JobTask) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_value(task)?))
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Parse the payload back into a task.
    pub fn task(&self) -> Result<JobTask, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// Check if the job is past its backoff window.
    pub fn is_ready(&self) -> bool {
        match self.scheduled_at {
            Some(at) => Utc::now() >= at,
            None => true,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.attempt += 1;
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self, started_at: DateTime<Utc>) {
        let now = Utc::now();
        self.status = JobStatus::Completed;
        self.updated_at = now;
        self.history.push(JobAttemptRecord {
            attempt: self.attempt,
            started_at,
            finished_at: now,
            success: true,
            error: None,
        });
    }

    /// Record a failed attempt. Schedules a retry with the fixed backoff, or
    /// transitions to `Exhausted` when attempts are used up.
    pub fn mark_failed(&mut self, error: String, started_at: DateTime<Utc>) {
        let now = Utc::now();
        self.updated_at = now;
        self.history.push(JobAttemptRecord {
            attempt: self.attempt,
            started_at,
            finished_at: now,
            success: false,
            error: Some(error.clone()),
        });

        if self.retry_policy.should_retry(self.attempt) {
            let delay = chrono::Duration::from_std(self.retry_policy.backoff)
                .unwrap_or_else(|_| chrono::Duration::zero());
            self.scheduled_at = Some(now + delay);
            self.status = JobStatus::Failed {
                error,
                attempt: self.attempt,
            };
        } else {
            self.status = JobStatus::Exhausted {
                error,
                attempts: self.attempt,
            };
        }
    }

    /// Drop a job whose payload cannot be interpreted. Never retried.
    pub fn mark_discarded(&mut self, reason: String) {
        self.status = JobStatus::Discarded { reason };
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brandhub_brands::{Brand, BrandDraft, BrandType};

    fn upload_task() -> JobTask {
        JobTask::UploadFile {
            brand: Brand::create(BrandDraft::new("Toyota", BrandType::Vehicle)).unwrap(),
            tmp_path: PathBuf::from("/tmp/uploads/icon.png"),
            folder: "brands".to_string(),
        }
    }

    #[test]
    fn task_roundtrips_through_payload() {
        let task = upload_task();
        let job = Job::for_task(&task).unwrap();

        assert_eq!(job.payload["task_type"], "uploadFile");
        assert_eq!(job.task().unwrap(), task);
    }

    #[test]
    fn unknown_task_tag_fails_to_parse() {
        let job = Job::new(serde_json::json!({
            "task_type": "resizeFile",
            "payload": { "url": "https://img.test/x.png" }
        }));
        assert!(job.task().is_err());
    }

    #[test]
    fn default_policy_is_three_attempts_with_five_second_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff, Duration::from_millis(5000));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn job_lifecycle_success() {
        let mut job = Job::for_task(&upload_task()).unwrap();
        assert!(matches!(job.status, JobStatus::Pending));
        assert_eq!(job.attempt, 0);

        job.mark_running();
        assert!(matches!(job.status, JobStatus::Running));
        assert_eq!(job.attempt, 1);

        job.mark_completed(Utc::now());
        assert!(job.status.is_terminal());
        assert_eq!(job.history.len(), 1);
        assert!(job.history[0].success);
    }

    #[test]
    fn failure_schedules_backoff_then_exhausts() {
        let mut job = Job::for_task(&JobTask::DeleteFile {
            url: "https://img.test/brands/1.png".to_string(),
        })
        .unwrap()
        .with_retry_policy(RetryPolicy::fixed(2, Duration::from_millis(5000)));

        job.mark_running();
        job.mark_failed("boom".to_string(), Utc::now());
        assert!(job.status.is_retriable());
        assert!(job.scheduled_at.is_some());
        assert!(!job.is_ready());

        job.mark_running();
        job.mark_failed("boom again".to_string(), Utc::now());
        assert!(matches!(job.status, JobStatus::Exhausted { attempts: 2, .. }));
        assert_eq!(job.history.len(), 2);
    }

    #[test]
    fn discarded_is_terminal_and_not_retriable() {
        let mut job = Job::new(serde_json::json!({"task_type": "nope"}));
        job.mark_discarded("unknown task type".to_string());
        assert!(job.status.is_terminal());
        assert!(!job.status.is_retriable());
    }
}
