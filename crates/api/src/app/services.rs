//! Brand service and infrastructure wiring.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use brandhub_brands::{Brand, BrandDraft};
use brandhub_core::{BrandId, DomainError};
use brandhub_infra::jobs::{
    IconQueue, InMemoryJobStore, JobStoreError, JobWorker, WorkerConfig, WorkerHandle,
};
use brandhub_infra::{
    BrandQuery, BrandStore, HttpImageStore, ImageStore, InMemoryBrandStore, InMemoryImageStore,
    Page, StoreError,
};

/// Service-layer error: domain failures stay typed, infrastructure failures
/// are wrapped with a message and rethrown.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Store(String),
    #[error("queue failure: {0}")]
    Queue(String),
    #[error("upload spool failure: {0}")]
    Upload(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ServiceError::Domain(DomainError::NotFound),
            StoreError::DuplicateName(name) => ServiceError::Domain(DomainError::conflict(
                format!("a brand named '{name}' already exists"),
            )),
            StoreError::Storage(msg) => ServiceError::Store(msg),
        }
    }
}

impl From<JobStoreError> for ServiceError {
    fn from(err: JobStoreError) -> Self {
        ServiceError::Queue(err.to_string())
    }
}

/// An upload already spooled to local disk by the HTTP layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub path: PathBuf,
    pub filename: String,
}

/// Orchestrates brand requests into store calls plus optional queued jobs.
///
/// Store and queue are injected; the service owns no background state and
/// never blocks on job execution.
#[derive(Clone)]
pub struct BrandService {
    store: Arc<dyn BrandStore>,
    queue: IconQueue,
}

impl BrandService {
    pub fn new(store: Arc<dyn BrandStore>, queue: IconQueue) -> Self {
        Self { store, queue }
    }

    /// Persist the brand first (icon empty), then enqueue the icon upload if
    /// a file was supplied. The response never waits for the upload.
    pub fn create_brand(
        &self,
        draft: BrandDraft,
        file: Option<UploadedFile>,
    ) -> Result<Brand, ServiceError> {
        draft.validate()?;
        if self.store.find_by_name(&draft.name)?.is_some() {
            return Err(DomainError::validation("name", "the brand already exists").into());
        }

        let brand = self.store.insert(Brand::create(draft)?)?;

        if let Some(file) = file {
            let job_id = self.queue.enqueue_upload(&brand, file.path)?;
            debug!(brand_id = %brand.id, %job_id, "queued icon upload");
        }

        Ok(brand)
    }

    pub fn list_brands(&self, query: &BrandQuery) -> Result<Page<Brand>, ServiceError> {
        Ok(self.store.paginate(query)?)
    }

    pub fn show_brand(&self, id: BrandId) -> Result<Brand, ServiceError> {
        self.store
            .find_by_id(id)?
            .ok_or_else(|| DomainError::not_found().into())
    }

    /// Update mutable fields first; a replacement icon queues deletion of
    /// the old image before the new upload, so the delete runs first.
    pub fn update_brand(
        &self,
        id: BrandId,
        draft: BrandDraft,
        file: Option<UploadedFile>,
    ) -> Result<Brand, ServiceError> {
        draft.validate()?;
        if let Some(existing) = self.store.find_by_name(&draft.name)? {
            if existing.id != id {
                return Err(DomainError::validation("name", "the brand already exists").into());
            }
        }

        let mut brand = self
            .store
            .find_by_id(id)?
            .ok_or(DomainError::NotFound)?;
        let old_icon = brand.icon.clone();

        brand.apply(draft)?;
        let brand = self.store.update(&brand)?;

        if let Some(file) = file {
            if !old_icon.is_empty() {
                let job_id = self.queue.enqueue_delete(&old_icon)?;
                debug!(brand_id = %brand.id, %job_id, "queued deletion of replaced icon");
            }
            let job_id = self.queue.enqueue_upload(&brand, file.path)?;
            debug!(brand_id = %brand.id, %job_id, "queued icon upload");
        }

        Ok(brand)
    }

    /// Queue removal of the remote icon (fire-and-forget), then remove the
    /// record. The record removal is never rolled back by the image job.
    pub fn delete_brand(&self, id: BrandId) -> Result<Brand, ServiceError> {
        let brand = self
            .store
            .find_by_id(id)?
            .ok_or(DomainError::NotFound)?;

        if brand.has_icon() {
            let job_id = self.queue.enqueue_delete(&brand.icon)?;
            debug!(brand_id = %brand.id, %job_id, "queued deletion of brand icon");
        }

        Ok(self.store.delete(id)?)
    }

    /// Flip the active flag and persist. No queue interaction.
    pub fn change_brand_status(&self, id: BrandId) -> Result<Brand, ServiceError> {
        let mut brand = self
            .store
            .find_by_id(id)?
            .ok_or(DomainError::NotFound)?;

        brand.is_active = !brand.is_active;
        brand.updated_at = Utc::now();
        Ok(self.store.update(&brand)?)
    }
}

/// Services shared by the HTTP handlers.
pub struct AppServices {
    pub brands: BrandService,
}

/// Wire up the store, image host, queue, and worker.
///
/// The returned handle owns the worker thread; keep it alive for the life of
/// the process. The image host client is HTTP-backed when `IMAGE_HOST_URL`
/// is set and falls back to the in-memory host for local development.
pub fn build_services() -> (AppServices, WorkerHandle) {
    let brand_store = InMemoryBrandStore::arc();
    let job_store = InMemoryJobStore::arc();

    let images: Arc<dyn ImageStore> = match std::env::var("IMAGE_HOST_URL") {
        Ok(url) => {
            let key = std::env::var("IMAGE_HOST_KEY").unwrap_or_default();
            Arc::new(HttpImageStore::new(url, key))
        }
        Err(_) => {
            tracing::warn!("IMAGE_HOST_URL not set; using in-memory image host");
            Arc::new(InMemoryImageStore::new())
        }
    };

    let queue = IconQueue::new(job_store.clone());
    let worker = JobWorker::new(job_store, brand_store.clone(), images)
        .spawn(WorkerConfig::default());

    let brands = BrandService::new(brand_store, queue);

    (AppServices { brands }, worker)
}
