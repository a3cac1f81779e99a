//! Teardown client for externally-managed execution resources.
//!
//! Teardown is always best-effort: callers log failures and continue.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Sandbox service error.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox request failed: {0}")]
    Request(String),
    #[error("sandbox service returned status {0}")]
    Status(u16),
}

/// Client for the external sandbox manager.
#[async_trait]
pub trait SandboxClient: Send + Sync {
    /// Request teardown of one resource.
    async fn teardown(&self, resource_id: &str) -> Result<(), SandboxError>;
}

/// HTTP client for the sandbox manager service.
pub struct HttpSandboxClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSandboxClient {
    /// Create a client for the service at `base_url`.
    ///
    /// # Errors
    /// Returns error if the underlying HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, SandboxError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SandboxError::Request(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

#[async_trait]
impl SandboxClient for HttpSandboxClient {
    async fn teardown(&self, resource_id: &str) -> Result<(), SandboxError> {
        let url = format!("{}/sessions/{resource_id}", self.base_url);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| SandboxError::Request(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SandboxError::Status(response.status().as_u16()))
        }
    }
}

/// No-op client for deployments without a sandbox manager.
#[derive(Debug, Default, Clone)]
pub struct NoopSandboxClient;

#[async_trait]
impl SandboxClient for NoopSandboxClient {
    async fn teardown(&self, _resource_id: &str) -> Result<(), SandboxError> {
        Ok(())
    }
}
