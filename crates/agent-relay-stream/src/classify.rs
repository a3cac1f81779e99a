//! Chunk classification.
//!
//! Raw chunks arrive with a stringly-typed kind. They are decoded here,
//! exactly once, into a closed union; everything downstream switches
//! exhaustively over [`StreamEvent`].

use agent_relay_core::RunChunk;

/// Whether a content event is user-facing output or delegated chatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    /// Top-level coordinator output with no nested member responses.
    Final,
    /// Intermediate or delegated output a client may hide.
    Log,
}

/// A classified run event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Streamed text content.
    Content {
        owner: Option<String>,
        text: String,
        class: ContentClass,
    },
    /// A tool invocation started.
    ToolStart {
        owner: Option<String>,
        tool: String,
    },
    /// A tool invocation finished.
    ToolEnd {
        owner: Option<String>,
        tool: String,
    },
}

/// Decode one raw chunk.
///
/// Content is `Final` iff the chunk's owner is the designated top-level
/// coordinator and it carries no nested member responses. Unrecognized
/// kinds and content-free content chunks decode to `None` and are dropped.
#[must_use]
pub fn classify(chunk: &RunChunk, coordinator: &str) -> Option<StreamEvent> {
    match chunk.event.as_str() {
        RunChunk::RUN_CONTENT => {
            let text = chunk.content.clone()?;
            let class = if chunk.owner.as_deref() == Some(coordinator)
                && chunk.member_responses == 0
            {
                ContentClass::Final
            } else {
                ContentClass::Log
            };
            Some(StreamEvent::Content {
                owner: chunk.owner.clone(),
                text,
                class,
            })
        }
        RunChunk::TOOL_CALL_STARTED => Some(StreamEvent::ToolStart {
            owner: chunk.owner.clone(),
            tool: chunk.tool_name.clone().unwrap_or_default(),
        }),
        RunChunk::TOOL_CALL_COMPLETED => Some(StreamEvent::ToolEnd {
            owner: chunk.owner.clone(),
            tool: chunk.tool_name.clone().unwrap_or_default(),
        }),
        other => {
            tracing::debug!(kind = other, "dropping unrecognized chunk kind");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COORDINATOR: &str = "coordinator";

    #[test]
    fn coordinator_content_is_final() {
        let event = classify(&RunChunk::content(COORDINATOR, "answer"), COORDINATOR).unwrap();
        assert_eq!(
            event,
            StreamEvent::Content {
                owner: Some(COORDINATOR.to_string()),
                text: "answer".to_string(),
                class: ContentClass::Final,
            }
        );
    }

    #[test]
    fn delegated_content_is_log() {
        let event = classify(&RunChunk::content("researcher", "digging"), COORDINATOR).unwrap();
        assert!(matches!(
            event,
            StreamEvent::Content {
                class: ContentClass::Log,
                ..
            }
        ));
    }

    #[test]
    fn coordinator_content_with_member_responses_is_log() {
        let chunk = RunChunk::content(COORDINATOR, "wrapping up").with_member_responses(2);
        let event = classify(&chunk, COORDINATOR).unwrap();
        assert!(matches!(
            event,
            StreamEvent::Content {
                class: ContentClass::Log,
                ..
            }
        ));
    }

    #[test]
    fn tool_lifecycle_chunks_carry_owner_and_name() {
        let started = classify(&RunChunk::tool_started("browser", "navigate"), COORDINATOR);
        assert_eq!(
            started,
            Some(StreamEvent::ToolStart {
                owner: Some("browser".to_string()),
                tool: "navigate".to_string(),
            })
        );

        let completed = classify(&RunChunk::tool_completed("browser", "navigate"), COORDINATOR);
        assert!(matches!(completed, Some(StreamEvent::ToolEnd { .. })));
    }

    #[test]
    fn unknown_kinds_are_dropped() {
        let chunk = RunChunk {
            event: "reasoning_trace".to_string(),
            ..RunChunk::default()
        };
        assert_eq!(classify(&chunk, COORDINATOR), None);
    }
}
