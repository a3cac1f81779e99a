//! Trait seams between the backend core and its collaborators.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

use crate::event::{ClientEvent, RunChunk, RunMetrics};
use crate::media::TurnMedia;

/// Push channel error.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("client connection closed")]
    Closed,
}

/// Live push channel to one connected client.
///
/// Implementations must preserve the order in which events are submitted.
#[async_trait]
pub trait ClientSink: Send + Sync {
    /// Push one event to the client.
    async fn send(&self, event: ClientEvent) -> Result<(), SinkError>;
}

/// Agent run error.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("agent run failed: {0}")]
    Failed(String),
}

/// Input to one agent run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Owning user.
    pub user_id: String,
    /// Conversation the run belongs to.
    pub conversation_id: String,
    /// Message id for the turn.
    pub message_id: String,
    /// Fully assembled user message (context prefix included).
    pub message: String,
    /// Media attached to the turn. `Bytes` payloads are shared, so this is
    /// a cheap clone of the caller's buffers.
    pub media: TurnMedia,
    /// Per-session capability configuration.
    pub config: HashMap<String, Value>,
    /// Opaque session state handed through to the collaborator.
    pub session_state: Value,
}

/// A started agent run: a stream of raw chunks, terminated by exhaustion.
///
/// Usage metrics arrive on the final output chunk.
pub struct AgentRun {
    /// The event stream.
    pub events: BoxStream<'static, Result<RunChunk, RunError>>,
}

/// The external, opaque agent-run collaborator.
///
/// Reasoning and tool selection happen behind this seam; the backend only
/// consumes the typed chunk stream.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Start a run for one message turn.
    async fn start(&self, request: RunRequest) -> Result<AgentRun, RunError>;
}

/// Media store error.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media object not found: {0}")]
    NotFound(String),
    #[error("media fetch failed: {0}")]
    Fetch(String),
}

/// Read access to the external blob store holding uploaded media.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Download one object by path.
    async fn download(&self, path: &str) -> Result<Bytes, MediaError>;
}

/// Metrics sink error.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics sink unavailable: {0}")]
    Unavailable(String),
}

/// Sink for per-turn token usage records.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Persist one usage record.
    async fn record_usage(&self, user_id: &str, metrics: RunMetrics) -> Result<(), MetricsError>;
}

/// In-memory metrics sink for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryMetrics {
    records: Mutex<Vec<(String, RunMetrics)>>,
}

impl MemoryMetrics {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded usage entries.
    ///
    /// # Panics
    /// Panics if the inner lock is poisoned.
    #[must_use]
    pub fn records(&self) -> Vec<(String, RunMetrics)> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricsSink for MemoryMetrics {
    async fn record_usage(&self, user_id: &str, metrics: RunMetrics) -> Result<(), MetricsError> {
        self.records
            .lock()
            .map_err(|e| MetricsError::Unavailable(e.to_string()))?
            .push((user_id.to_string(), metrics));
        Ok(())
    }
}

/// Context source error.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("context fetch failed: {0}")]
    Fetch(String),
}

/// Access to prior conversation transcripts, for cross-session context.
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// Fetch a rendered transcript excerpt for one session id.
    async fn fetch(&self, session_id: &str) -> Result<Option<String>, ContextError>;
}

/// Context source that never returns any history.
#[derive(Debug, Default, Clone)]
pub struct NoopContextSource;

#[async_trait]
impl ContextSource for NoopContextSource {
    async fn fetch(&self, _session_id: &str) -> Result<Option<String>, ContextError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_metrics_records_usage() {
        let sink = MemoryMetrics::new();
        let metrics = RunMetrics {
            input_tokens: 120,
            output_tokens: 45,
        };

        sink.record_usage("user-1", metrics).await.unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, "user-1");
        assert_eq!(records[0].1, metrics);
    }
}
