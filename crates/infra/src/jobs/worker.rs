//! Job worker: claims jobs, dispatches tasks, applies retry policy.

use std::fs;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::media::ImageStore;
use crate::store::BrandStore;

use super::store::JobStore;
use super::types::{Job, JobStatus, JobTask};

/// Callback invoked with the job record after a terminal transition.
pub type JobCallback = Box<dyn Fn(&Job) + Send + Sync>;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often to poll for runnable jobs.
    pub poll_interval: Duration,
    /// Thread name for logging.
    pub name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            name: "icon-worker".to_string(),
        }
    }
}

/// Handle to control a running worker thread.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the thread to finish.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Background job worker.
///
/// Pulls jobs from the store one at a time (FIFO), parses the payload into a
/// typed task, and executes it against the image host and the brand store.
/// Failures retry per the job's policy; unparseable payloads are logged and
/// discarded.
pub struct JobWorker {
    jobs: Arc<dyn JobStore>,
    brands: Arc<dyn BrandStore>,
    images: Arc<dyn ImageStore>,
    on_completed: Option<JobCallback>,
    on_failed: Option<JobCallback>,
}

impl JobWorker {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        brands: Arc<dyn BrandStore>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            jobs,
            brands,
            images,
            on_completed: None,
            on_failed: None,
        }
    }

    /// Observe jobs that complete successfully.
    pub fn on_completed<F>(mut self, f: F) -> Self
    where
        F: Fn(&Job) + Send + Sync + 'static,
    {
        self.on_completed = Some(Box::new(f));
        self
    }

    /// Observe jobs that exhaust their retries.
    pub fn on_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&Job) + Send + Sync + 'static,
    {
        self.on_failed = Some(Box::new(f));
        self
    }

    /// Spawn the polling loop on a dedicated thread.
    pub fn spawn(self, config: WorkerConfig) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let name = config.name.clone();
        let join = thread::Builder::new()
            .name(name)
            .spawn(move || self.run_loop(config, shutdown_rx))
            .expect("failed to spawn job worker thread");

        WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }

    fn run_loop(&self, config: WorkerConfig, shutdown_rx: mpsc::Receiver<()>) {
        info!(worker = %config.name, "job worker started");

        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            match self.run_one() {
                Ok(true) => {}
                Ok(false) => thread::sleep(config.poll_interval),
                Err(e) => {
                    error!(worker = %config.name, error = %e, "failed to claim job");
                    thread::sleep(config.poll_interval);
                }
            }
        }

        info!(worker = %config.name, "job worker stopped");
    }

    /// Claim and execute at most one job. Returns whether a job was claimed.
    pub fn run_one(&self) -> Result<bool, String> {
        let Some(mut job) = self.jobs.claim_next().map_err(|e| e.to_string())? else {
            return Ok(false);
        };

        debug!(job_id = %job.id, attempt = job.attempt, "claimed job");
        self.execute(&mut job);
        Ok(true)
    }

    /// Execute every currently runnable job (backed-off jobs are skipped).
    /// Test/embedding helper; the spawned loop calls `run_one` directly.
    pub fn drain(&self) -> Result<usize, String> {
        let mut processed = 0;
        while self.run_one()? {
            processed += 1;
        }
        Ok(processed)
    }

    fn execute(&self, job: &mut Job) {
        let started = Utc::now();

        let task = match job.task() {
            Ok(task) => task,
            Err(e) => {
                // Not retried and not counted as a failure: the payload will
                // never become interpretable.
                warn!(job_id = %job.id, error = %e, "unknown task payload, discarding job");
                job.mark_discarded(format!("unparseable task payload: {e}"));
                self.persist(job);
                return;
            }
        };

        match self.run_task(&task) {
            Ok(()) => {
                job.mark_completed(started);
                self.persist(job);
                debug!(job_id = %job.id, task = task.kind(), "job completed");
                if let Some(cb) = &self.on_completed {
                    cb(job);
                }
            }
            Err(e) => {
                job.mark_failed(e.clone(), started);
                self.persist(job);
                match &job.status {
                    JobStatus::Exhausted { attempts, .. } => {
                        error!(
                            job_id = %job.id,
                            task = task.kind(),
                            attempts,
                            error = %e,
                            "job failed permanently"
                        );
                        if let Some(cb) = &self.on_failed {
                            cb(job);
                        }
                    }
                    _ => {
                        warn!(
                            job_id = %job.id,
                            task = task.kind(),
                            attempt = job.attempt,
                            error = %e,
                            "job attempt failed, will retry"
                        );
                    }
                }
            }
        }
    }

    fn run_task(&self, task: &JobTask) -> Result<(), String> {
        match task {
            JobTask::UploadFile {
                brand,
                tmp_path,
                folder,
            } => {
                let bytes = fs::read(tmp_path)
                    .map_err(|e| format!("read {}: {e}", tmp_path.display()))?;

                let url = self
                    .images
                    .upload_image(&bytes, folder)
                    .map_err(|e| e.to_string())?;

                // Spool cleanup; an already-gone temp file is not a failure.
                if let Err(e) = fs::remove_file(tmp_path) {
                    warn!(path = %tmp_path.display(), error = %e, "failed to remove temp upload");
                }

                let mut brand = brand.clone();
                brand.icon = url;
                brand.updated_at = Utc::now();
                self.brands.update(&brand).map_err(|e| e.to_string())?;
                Ok(())
            }
            JobTask::DeleteFile { url } => {
                self.images.delete_image(url).map_err(|e| e.to_string())
            }
        }
    }

    fn persist(&self, job: &Job) {
        if let Err(e) = self.jobs.update(job) {
            error!(job_id = %job.id, error = %e, "failed to persist job state");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::jobs::{IconQueue, InMemoryJobStore, JobId, RetryPolicy};
    use crate::media::InMemoryImageStore;
    use crate::store::InMemoryBrandStore;
    use brandhub_brands::{Brand, BrandDraft, BrandType};

    struct Rig {
        jobs: Arc<InMemoryJobStore>,
        brands: Arc<InMemoryBrandStore>,
        images: Arc<InMemoryImageStore>,
        queue: IconQueue,
    }

    impl Rig {
        fn new() -> Self {
            let jobs = InMemoryJobStore::arc();
            Self {
                queue: IconQueue::new(jobs.clone()),
                jobs,
                brands: InMemoryBrandStore::arc(),
                images: Arc::new(InMemoryImageStore::new()),
            }
        }

        fn worker(&self) -> JobWorker {
            JobWorker::new(self.jobs.clone(), self.brands.clone(), self.images.clone())
        }

        fn stored_brand(&self, name: &str) -> Brand {
            self.brands
                .insert(Brand::create(BrandDraft::new(name, BrandType::Vehicle)).unwrap())
                .unwrap()
        }

        /// Clear a job's backoff so the next claim sees it immediately.
        fn skip_backoff(&self, id: JobId) {
            let mut job = self.jobs.get(id).unwrap().unwrap();
            job.scheduled_at = None;
            self.jobs.update(&job).unwrap();
        }
    }

    fn spooled_icon(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("icon.png");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"fake-png-bytes").unwrap();
        path
    }

    #[test]
    fn upload_job_sets_icon_and_removes_temp_file() {
        let rig = Rig::new();
        let dir = tempfile::tempdir().unwrap();
        let path = spooled_icon(&dir);
        let brand = rig.stored_brand("Toyota");

        rig.queue.enqueue_upload(&brand, &path).unwrap();
        let processed = rig.worker().drain().unwrap();
        assert_eq!(processed, 1);

        let stored = rig.brands.find_by_id(brand.id).unwrap().unwrap();
        assert_eq!(stored.icon, rig.images.uploaded_urls()[0]);
        assert!(!path.exists());
        assert_eq!(rig.jobs.stats().unwrap().completed, 1);
    }

    #[test]
    fn delete_job_calls_image_host_and_touches_no_brand() {
        let rig = Rig::new();
        let brand = rig.stored_brand("Honda");

        rig.queue
            .enqueue_delete("https://img.test/brands/old.png")
            .unwrap();
        rig.worker().drain().unwrap();

        assert_eq!(
            rig.images.deleted_urls(),
            vec!["https://img.test/brands/old.png"]
        );
        let stored = rig.brands.find_by_id(brand.id).unwrap().unwrap();
        assert_eq!(stored, brand);
    }

    #[test]
    fn job_succeeding_on_third_attempt_completes_and_applies_once() {
        let rig = Rig::new();
        let dir = tempfile::tempdir().unwrap();
        let path = spooled_icon(&dir);
        let brand = rig.stored_brand("Mazda");

        rig.images.fail_next_uploads(2);
        let id = rig.queue.enqueue_upload(&brand, &path).unwrap();
        let worker = rig.worker();

        // Attempts 1 and 2 fail and back off.
        for expected_attempt in 1u32..=2 {
            assert_eq!(worker.drain().unwrap(), 1);
            let job = rig.jobs.get(id).unwrap().unwrap();
            assert!(matches!(job.status, JobStatus::Failed { attempt, .. } if attempt == expected_attempt));
            rig.skip_backoff(id);
        }

        // Attempt 3 succeeds.
        assert_eq!(worker.drain().unwrap(), 1);
        let job = rig.jobs.get(id).unwrap().unwrap();
        assert!(matches!(job.status, JobStatus::Completed));
        assert_eq!(job.history.len(), 3);

        assert_eq!(rig.images.uploaded_urls().len(), 1);
        let stored = rig.brands.find_by_id(brand.id).unwrap().unwrap();
        assert_eq!(stored.icon, rig.images.uploaded_urls()[0]);
    }

    #[test]
    fn job_failing_all_attempts_exhausts_and_leaves_icon_unchanged() {
        let rig = Rig::new();
        let dir = tempfile::tempdir().unwrap();
        let path = spooled_icon(&dir);
        let brand = rig.stored_brand("Subaru");

        rig.images.fail_next_uploads(3);
        let id = rig.queue.enqueue_upload(&brand, &path).unwrap();

        let failures = Arc::new(AtomicUsize::new(0));
        let failures_seen = failures.clone();
        let worker = rig.worker().on_failed(move |_job| {
            failures_seen.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..3 {
            worker.drain().unwrap();
            rig.skip_backoff(id);
        }

        let job = rig.jobs.get(id).unwrap().unwrap();
        assert!(matches!(job.status, JobStatus::Exhausted { attempts: 3, .. }));
        assert_eq!(failures.load(Ordering::SeqCst), 1);

        let stored = rig.brands.find_by_id(brand.id).unwrap().unwrap();
        assert_eq!(stored.icon, "");
    }

    #[test]
    fn unparseable_payload_is_discarded_not_retried() {
        let rig = Rig::new();
        rig.jobs
            .enqueue(Job::new(serde_json::json!({
                "task_type": "transcodeVideo",
                "payload": {}
            })))
            .unwrap();

        let worker = rig.worker();
        assert_eq!(worker.drain().unwrap(), 1);

        let stats = rig.jobs.stats().unwrap();
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.failed, 0);
        assert!(rig.jobs.claim_next().unwrap().is_none());
    }

    #[test]
    fn completion_callback_fires_with_the_job() {
        let rig = Rig::new();
        let dir = tempfile::tempdir().unwrap();
        let path = spooled_icon(&dir);
        let brand = rig.stored_brand("Kia");
        let id = rig.queue.enqueue_upload(&brand, &path).unwrap();

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_in_cb = seen.clone();
        let worker = rig.worker().on_completed(move |job| {
            seen_in_cb.lock().unwrap().push(job.id);
        });
        worker.drain().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![id]);
    }

    #[test]
    fn upload_for_a_deleted_brand_fails_and_retries() {
        let rig = Rig::new();
        let dir = tempfile::tempdir().unwrap();
        let path = spooled_icon(&dir);
        let brand = rig.stored_brand("Fiat");

        let id = rig.queue.enqueue_upload(&brand, &path).unwrap();
        rig.brands.delete(brand.id).unwrap();

        rig.worker().drain().unwrap();
        let job = rig.jobs.get(id).unwrap().unwrap();
        assert!(job.status.is_retriable());
    }

    #[test]
    fn spawned_worker_processes_jobs_and_shuts_down() {
        let rig = Rig::new();
        let dir = tempfile::tempdir().unwrap();
        let path = spooled_icon(&dir);
        let brand = rig.stored_brand("Nissan");
        rig.queue.enqueue_upload(&brand, &path).unwrap();

        let handle = rig.worker().spawn(WorkerConfig {
            poll_interval: Duration::from_millis(5),
            name: "icon-worker-test".to_string(),
        });

        // The worker polls every 5ms; give it a moment to drain the queue.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while rig.jobs.stats().unwrap().completed == 0 {
            assert!(std::time::Instant::now() < deadline, "worker never ran the job");
            thread::sleep(Duration::from_millis(10));
        }
        handle.shutdown();

        let stored = rig.brands.find_by_id(brand.id).unwrap().unwrap();
        assert!(stored.has_icon());
    }
}
