//! Enqueue client handed to the service layer.

use std::sync::Arc;

use tracing::debug;

use brandhub_brands::Brand;

use super::store::{JobStore, JobStoreError};
use super::types::{Job, JobId, JobTask, RetryPolicy};

/// Queue client for icon work.
///
/// Injected into the service at construction; enqueue durably records the
/// job and returns immediately, so HTTP responses are never delayed by job
/// execution.
#[derive(Clone)]
pub struct IconQueue {
    store: Arc<dyn JobStore>,
    policy: RetryPolicy,
    folder: String,
}

impl IconQueue {
    pub const DEFAULT_FOLDER: &'static str = "brands";

    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            policy: RetryPolicy::default(),
            folder: Self::DEFAULT_FOLDER.to_string(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    /// Enqueue an icon upload for `brand`, reading the spooled file at
    /// `tmp_path`. The brand snapshot travels with the job.
    pub fn enqueue_upload(
        &self,
        brand: &Brand,
        tmp_path: impl Into<std::path::PathBuf>,
    ) -> Result<JobId, JobStoreError> {
        self.enqueue(&JobTask::UploadFile {
            brand: brand.clone(),
            tmp_path: tmp_path.into(),
            folder: self.folder.clone(),
        })
    }

    /// Enqueue deletion of a remote image by URL.
    pub fn enqueue_delete(&self, url: impl Into<String>) -> Result<JobId, JobStoreError> {
        self.enqueue(&JobTask::DeleteFile { url: url.into() })
    }

    fn enqueue(&self, task: &JobTask) -> Result<JobId, JobStoreError> {
        let job = Job::for_task(task)
            .map_err(|e| JobStoreError::Storage(e.to_string()))?
            .with_retry_policy(self.policy.clone());
        let id = self.store.enqueue(job)?;
        debug!(job_id = %id, task = task.kind(), "job enqueued");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::store::InMemoryJobStore;
    use brandhub_brands::{Brand, BrandDraft, BrandType};

    #[test]
    fn enqueue_records_the_job_without_running_it() {
        let store = InMemoryJobStore::arc();
        let queue = IconQueue::new(store.clone());
        let brand = Brand::create(BrandDraft::new("Toyota", BrandType::Vehicle)).unwrap();

        let id = queue.enqueue_upload(&brand, "/tmp/uploads/icon.png").unwrap();

        let job = store.get(id).unwrap().unwrap();
        assert!(matches!(job.status, crate::jobs::JobStatus::Pending));
        assert_eq!(job.retry_policy.max_attempts, 3);
        match job.task().unwrap() {
            JobTask::UploadFile { brand: b, folder, .. } => {
                assert_eq!(b.id, brand.id);
                assert_eq!(folder, "brands");
            }
            other => panic!("unexpected task: {other:?}"),
        }
    }

    #[test]
    fn delete_enqueues_in_order_before_a_following_upload() {
        let store = InMemoryJobStore::arc();
        let queue = IconQueue::new(store.clone());
        let brand = Brand::create(BrandDraft::new("Honda", BrandType::Vehicle)).unwrap();

        let del = queue.enqueue_delete("https://img.test/brands/old.png").unwrap();
        let up = queue.enqueue_upload(&brand, "/tmp/uploads/new.png").unwrap();

        assert_eq!(store.claim_next().unwrap().unwrap().id, del);
        assert_eq!(store.claim_next().unwrap().unwrap().id, up);
    }
}
