//! HTTP client for the external media store.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use agent_relay_core::traits::{MediaError, MediaStore};

/// Media store reached over plain HTTP GET.
pub struct HttpMediaStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMediaStore {
    /// Create a client for the store at `base_url`.
    ///
    /// # Errors
    /// Returns error if the underlying HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MediaError::Fetch(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl MediaStore for HttpMediaStore {
    async fn download(&self, path: &str) -> Result<Bytes, MediaError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MediaError::Fetch(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MediaError::NotFound(path.to_string()));
        }
        let response = response
            .error_for_status()
            .map_err(|e| MediaError::Fetch(e.to_string()))?;
        response
            .bytes()
            .await
            .map_err(|e| MediaError::Fetch(e.to_string()))
    }
}
