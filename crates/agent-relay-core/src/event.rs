//! Event types shared across the backend.
//!
//! `ClientEvent` is the server-to-client protocol pushed over the live
//! connection. `RunChunk` is the raw wire shape produced by the agent-run
//! collaborator; the stream multiplexer decodes it exactly once into its
//! closed event union.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind discriminator for agent step events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// A tool invocation started.
    ToolStart,
    /// A tool invocation finished.
    ToolEnd,
}

/// Status reported for a background task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRunStatus {
    /// The executor picked the task up.
    Processing,
    /// The task finished and its work artifact was saved.
    Completed,
    /// The execution failed; the task was rolled back.
    Error,
}

/// Server-to-client event pushed over the live connection.
///
/// The `response` variant covers both streamed chunks and the terminal
/// `done` marker; use [`ClientEvent::chunk`] and [`ClientEvent::done`] to
/// build the two wire forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Informational status message.
    Status { message: String },
    /// Streamed response content, or the terminal done marker.
    #[serde(rename_all = "camelCase")]
    Response {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        streaming: Option<bool>,
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_log: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        done: Option<bool>,
    },
    /// Tool lifecycle notification for the turn identified by `id`.
    #[serde(rename_all = "camelCase")]
    AgentStep {
        #[serde(rename = "type")]
        step: StepKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_name: Option<String>,
        id: String,
    },
    /// User-facing error. Conversation state is preserved.
    Error { message: String },
    /// Progress of a background task execution.
    #[serde(rename_all = "camelCase")]
    TaskExecutionStatus {
        task_id: String,
        status: TaskRunStatus,
        message: String,
    },
    /// Remote command the client must execute and answer out-of-band.
    #[serde(rename_all = "camelCase")]
    Command {
        action: String,
        #[serde(flatten)]
        params: serde_json::Map<String, Value>,
        request_id: String,
    },
    /// Keepalive response.
    Pong,
}

impl ClientEvent {
    /// Build a streamed response chunk.
    #[must_use]
    pub fn chunk(
        content: impl Into<String>,
        id: impl Into<String>,
        agent_name: Option<String>,
        is_log: bool,
    ) -> Self {
        Self::Response {
            content: Some(content.into()),
            streaming: Some(true),
            id: id.into(),
            agent_name,
            is_log: Some(is_log),
            done: None,
        }
    }

    /// Build the terminal done marker for a message id.
    #[must_use]
    pub fn done(id: impl Into<String>) -> Self {
        Self::Response {
            content: None,
            streaming: None,
            id: id.into(),
            agent_name: None,
            is_log: None,
            done: Some(true),
        }
    }
}

/// Token usage reported by an agent run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Input tokens consumed.
    pub input_tokens: u64,
    /// Output tokens produced.
    pub output_tokens: u64,
}

impl RunMetrics {
    /// Whether no usage was reported at all.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0
    }
}

/// Raw chunk emitted by the agent-run collaborator.
///
/// The `event` field is stringly typed on the wire; downstream code must
/// not branch on it directly. The multiplexer decodes chunks into its
/// closed union at the boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunChunk {
    /// Event kind as reported by the collaborator.
    pub event: String,
    /// Which agent or sub-team produced the chunk.
    #[serde(default)]
    pub owner: Option<String>,
    /// Content payload, for content chunks.
    #[serde(default)]
    pub content: Option<String>,
    /// Tool name, for tool lifecycle chunks.
    #[serde(default)]
    pub tool_name: Option<String>,
    /// Number of nested member responses carried by this chunk.
    #[serde(default)]
    pub member_responses: usize,
    /// Usage metrics, reported on the final output chunk.
    #[serde(default)]
    pub metrics: Option<RunMetrics>,
}

impl RunChunk {
    /// Chunk kind string for streamed content.
    pub const RUN_CONTENT: &'static str = "run_content";
    /// Chunk kind string for a started tool call.
    pub const TOOL_CALL_STARTED: &'static str = "tool_call_started";
    /// Chunk kind string for a completed tool call.
    pub const TOOL_CALL_COMPLETED: &'static str = "tool_call_completed";

    /// Build a content chunk.
    #[must_use]
    pub fn content(owner: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            event: Self::RUN_CONTENT.to_string(),
            owner: Some(owner.into()),
            content: Some(text.into()),
            ..Self::default()
        }
    }

    /// Build a tool-start chunk.
    #[must_use]
    pub fn tool_started(owner: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            event: Self::TOOL_CALL_STARTED.to_string(),
            owner: Some(owner.into()),
            tool_name: Some(tool.into()),
            ..Self::default()
        }
    }

    /// Build a tool-end chunk.
    #[must_use]
    pub fn tool_completed(owner: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            event: Self::TOOL_CALL_COMPLETED.to_string(),
            owner: Some(owner.into()),
            tool_name: Some(tool.into()),
            ..Self::default()
        }
    }

    /// Attach usage metrics to this chunk.
    #[must_use]
    pub const fn with_metrics(mut self, metrics: RunMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Mark this content chunk as carrying nested member responses.
    #[must_use]
    pub const fn with_member_responses(mut self, count: usize) -> Self {
        self.member_responses = count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_chunk_wire_shape() {
        let event = ClientEvent::chunk("hello", "msg-1", Some("coordinator".into()), false);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "response");
        assert_eq!(json["content"], "hello");
        assert_eq!(json["streaming"], true);
        assert_eq!(json["id"], "msg-1");
        assert_eq!(json["agentName"], "coordinator");
        assert_eq!(json["isLog"], false);
        assert!(json.get("done").is_none());
    }

    #[test]
    fn response_done_wire_shape() {
        let json = serde_json::to_value(ClientEvent::done("msg-1")).unwrap();

        assert_eq!(json["event"], "response");
        assert_eq!(json["done"], true);
        assert_eq!(json["id"], "msg-1");
        assert!(json.get("content").is_none());
        assert!(json.get("streaming").is_none());
    }

    #[test]
    fn agent_step_uses_type_field() {
        let event = ClientEvent::AgentStep {
            step: StepKind::ToolStart,
            name: Some("navigate".into()),
            agent_name: Some("browser".into()),
            id: "msg-2".into(),
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "agentStep");
        assert_eq!(json["type"], "tool_start");
        assert_eq!(json["name"], "navigate");
    }

    #[test]
    fn command_flattens_params() {
        let mut params = serde_json::Map::new();
        params.insert("url".into(), "https://example.com".into());
        let event = ClientEvent::Command {
            action: "navigate".into(),
            params,
            request_id: "req-1".into(),
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "command");
        assert_eq!(json["action"], "navigate");
        assert_eq!(json["url"], "https://example.com");
        assert_eq!(json["requestId"], "req-1");
    }

    #[test]
    fn task_execution_status_wire_shape() {
        let event = ClientEvent::TaskExecutionStatus {
            task_id: "task-1".into(),
            status: TaskRunStatus::Processing,
            message: "working".into(),
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "taskExecutionStatus");
        assert_eq!(json["taskId"], "task-1");
        assert_eq!(json["status"], "processing");
    }

    #[test]
    fn metrics_zero_check() {
        assert!(RunMetrics::default().is_zero());
        assert!(
            !RunMetrics {
                input_tokens: 120,
                output_tokens: 45
            }
            .is_zero()
        );
    }
}
