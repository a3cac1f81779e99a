//! Agent-run stream multiplexing.
//!
//! One run is a tree: a top-level coordinator delegating to nested
//! sub-agents. The multiplexer flattens it into a single ordered event
//! sequence addressed to one message id, pushing each event the instant
//! it is classified.

use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;

use agent_relay_core::{
    AgentRunner, ClientEvent, RunMetrics, RunRequest, StepKind,
    traits::{ClientSink, MetricsSink, RunError, SinkError},
};

use crate::classify::{ContentClass, StreamEvent, classify};

/// Multiplexer configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Owner name whose content counts as final output.
    pub coordinator: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            coordinator: "coordinator".to_string(),
        }
    }
}

/// Message shown to the user when a turn fails mid-stream. Prior
/// conversation history is never touched by a failed turn.
const TURN_FAILED_MESSAGE: &str =
    "Something went wrong while processing your message. Your conversation history is intact; please try again.";

#[derive(Debug, Error)]
enum DrainError {
    #[error(transparent)]
    Run(#[from] RunError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Relays one agent run to one connected client.
pub struct StreamMultiplexer {
    runner: Arc<dyn AgentRunner>,
    metrics: Arc<dyn MetricsSink>,
    config: StreamConfig,
}

impl StreamMultiplexer {
    /// Create a multiplexer over the given run collaborator.
    pub fn new(
        runner: Arc<dyn AgentRunner>,
        metrics: Arc<dyn MetricsSink>,
        config: StreamConfig,
    ) -> Self {
        Self {
            runner,
            metrics,
            config,
        }
    }

    /// Drive one message turn to completion.
    ///
    /// Emission contract: every classified event is pushed immediately,
    /// with a cooperative yield after each push so one long run cannot
    /// starve other connections on the same worker. Exactly one terminal
    /// `done` is emitted for the message id on every exit path. A drain
    /// failure becomes a single user-facing error event; non-zero usage
    /// metrics are persisted exactly once on clean completion; turn media
    /// buffers are dropped in the always-runs epilogue.
    pub async fn relay(&self, sink: &dyn ClientSink, mut request: RunRequest) {
        let user_id = request.user_id.clone();
        let message_id = request.message_id.clone();
        let mut media = std::mem::take(&mut request.media);
        request.media = media.clone();

        match self.drain(sink, request, &message_id).await {
            Ok(Some(metrics)) if !metrics.is_zero() => {
                if let Err(e) = self.metrics.record_usage(&user_id, metrics).await {
                    tracing::error!(user_id, error = %e, "usage metrics lost");
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(message_id, error = %e, "turn failed mid-stream");
                let event = ClientEvent::Error {
                    message: TURN_FAILED_MESSAGE.to_string(),
                };
                if let Err(e) = sink.send(event).await {
                    tracing::warn!(message_id, error = %e, "error event undeliverable");
                }
            }
        }

        if let Err(e) = sink.send(ClientEvent::done(&message_id)).await {
            tracing::warn!(message_id, error = %e, "done event undeliverable");
        }
        media.clear();
    }

    async fn drain(
        &self,
        sink: &dyn ClientSink,
        request: RunRequest,
        message_id: &str,
    ) -> Result<Option<RunMetrics>, DrainError> {
        let mut run = self.runner.start(request).await?;
        let mut latest_metrics = None;

        while let Some(chunk) = run.events.next().await {
            let chunk = chunk?;
            if let Some(metrics) = chunk.metrics {
                latest_metrics = Some(metrics);
            }
            let Some(event) = classify(&chunk, &self.config.coordinator) else {
                continue;
            };
            sink.send(to_client_event(event, message_id)).await?;
            tokio::task::yield_now().await;
        }

        Ok(latest_metrics)
    }
}

fn to_client_event(event: StreamEvent, message_id: &str) -> ClientEvent {
    match event {
        StreamEvent::Content { owner, text, class } => ClientEvent::chunk(
            text,
            message_id,
            owner,
            matches!(class, ContentClass::Log),
        ),
        StreamEvent::ToolStart { owner, tool } => ClientEvent::AgentStep {
            step: StepKind::ToolStart,
            name: Some(tool),
            agent_name: owner,
            id: message_id.to_string(),
        },
        StreamEvent::ToolEnd { owner, tool } => ClientEvent::AgentStep {
            step: StepKind::ToolEnd,
            name: Some(tool),
            agent_name: owner,
            id: message_id.to_string(),
        },
    }
}
