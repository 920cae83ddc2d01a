//! Image host client.
//!
//! Uploads icon buffers to the remote image host and deletes images by URL.
//! The blocking HTTP client is only ever driven from the job worker thread,
//! never from inside the async runtime.

use std::sync::Mutex;

use serde::Deserialize;

/// Image host error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MediaError {
    /// Network-level failure (connect, timeout, read).
    #[error("image host request failed: {0}")]
    Transport(String),
    /// The host answered with a non-success status.
    #[error("image host rejected the request: {0}")]
    Rejected(String),
}

/// Client abstraction over the remote image hosting service.
pub trait ImageStore: Send + Sync {
    /// Upload an image buffer into `folder`; returns the canonical URL.
    fn upload_image(&self, bytes: &[u8], folder: &str) -> Result<String, MediaError>;

    /// Delete a previously uploaded image, identified by its URL.
    fn delete_image(&self, url: &str) -> Result<(), MediaError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// HTTP-backed image host client.
pub struct HttpImageStore {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl HttpImageStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/images", self.base_url.trim_end_matches('/'))
    }
}

impl ImageStore for HttpImageStore {
    fn upload_image(&self, bytes: &[u8], folder: &str) -> Result<String, MediaError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .query(&[("folder", folder)])
            .body(bytes.to_vec())
            .send()
            .map_err(|e| MediaError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(MediaError::Rejected(format!("{status}: {body}")));
        }

        let parsed: UploadResponse = response
            .json()
            .map_err(|e| MediaError::Rejected(format!("malformed upload response: {e}")))?;
        Ok(parsed.url)
    }

    fn delete_image(&self, url: &str) -> Result<(), MediaError> {
        let response = self
            .client
            .delete(self.endpoint())
            .bearer_auth(&self.api_key)
            .query(&[("url", url)])
            .send()
            .map_err(|e| MediaError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(MediaError::Rejected(format!("{status}: {body}")));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryImageState {
    uploads: Vec<(String, usize, String)>,
    deletes: Vec<String>,
    fail_uploads: u32,
    fail_deletes: u32,
    counter: u64,
}

/// In-memory image host for tests/dev.
///
/// Records every upload/delete and can be scripted to fail the next N calls
/// to exercise the worker's retry path.
#[derive(Debug, Default)]
pub struct InMemoryImageStore {
    inner: Mutex<InMemoryImageState>,
}

impl InMemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` uploads fail with a transport error.
    pub fn fail_next_uploads(&self, n: u32) {
        self.lock().fail_uploads = n;
    }

    /// Make the next `n` deletes fail with a transport error.
    pub fn fail_next_deletes(&self, n: u32) {
        self.lock().fail_deletes = n;
    }

    /// URLs handed out so far, in upload order.
    pub fn uploaded_urls(&self) -> Vec<String> {
        self.lock().uploads.iter().map(|u| u.2.clone()).collect()
    }

    /// URLs deleted so far, in delete order.
    pub fn deleted_urls(&self) -> Vec<String> {
        self.lock().deletes.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryImageState> {
        // Test double: a poisoned lock means a test already panicked.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ImageStore for InMemoryImageStore {
    fn upload_image(&self, bytes: &[u8], folder: &str) -> Result<String, MediaError> {
        let mut state = self.lock();
        if state.fail_uploads > 0 {
            state.fail_uploads -= 1;
            return Err(MediaError::Transport("injected upload failure".into()));
        }
        state.counter += 1;
        let url = format!("https://img.test/{folder}/{}.png", state.counter);
        state.uploads.push((folder.to_string(), bytes.len(), url.clone()));
        Ok(url)
    }

    fn delete_image(&self, url: &str) -> Result<(), MediaError> {
        let mut state = self.lock();
        if state.fail_deletes > 0 {
            state.fail_deletes -= 1;
            return Err(MediaError::Transport("injected delete failure".into()));
        }
        state.deletes.push(url.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploads_return_distinct_urls_per_folder() {
        let store = InMemoryImageStore::new();
        let a = store.upload_image(b"png-bytes", "brands").unwrap();
        let b = store.upload_image(b"png-bytes", "brands").unwrap();

        assert_ne!(a, b);
        assert!(a.starts_with("https://img.test/brands/"));
        assert_eq!(store.uploaded_urls(), vec![a, b]);
    }

    #[test]
    fn scripted_failures_are_consumed_in_order() {
        let store = InMemoryImageStore::new();
        store.fail_next_uploads(2);

        assert!(store.upload_image(b"x", "brands").is_err());
        assert!(store.upload_image(b"x", "brands").is_err());
        assert!(store.upload_image(b"x", "brands").is_ok());
    }

    #[test]
    fn deletes_are_recorded() {
        let store = InMemoryImageStore::new();
        store.delete_image("https://img.test/brands/1.png").unwrap();
        assert_eq!(store.deleted_urls(), vec!["https://img.test/brands/1.png"]);
    }
}
