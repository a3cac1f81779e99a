//! Turn preparation.
//!
//! Turns a raw inbound message into a ready run request: resolve the
//! owning session (refreshing its TTL), materialize attached files, and
//! prepend historical context from earlier conversations.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

use agent_relay_core::{
    FileRef, Media, RunRequest, TurnMedia,
    traits::{ContextSource, MediaStore},
};
use agent_relay_session::{SessionError, SessionStore};

/// Raw inbound turn, as received from the transport.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub user_id: String,
    pub conversation_id: String,
    pub message_id: String,
    pub message: String,
    pub files: Vec<FileRef>,
    pub context_session_ids: Vec<String>,
}

/// Turn preparation error.
#[derive(Debug, Error)]
pub enum TurnError {
    /// The conversation has no live session; the caller decides whether
    /// to create one or surface an error.
    #[error("no session for conversation '{0}'")]
    SessionNotFound(String),
    #[error(transparent)]
    Session(SessionError),
}

/// Assembles run requests for inbound messages.
pub struct TurnComposer {
    sessions: Arc<SessionStore>,
    media: Arc<dyn MediaStore>,
    context: Arc<dyn ContextSource>,
}

impl TurnComposer {
    /// Create a composer over the given collaborators.
    pub fn new(
        sessions: Arc<SessionStore>,
        media: Arc<dyn MediaStore>,
        context: Arc<dyn ContextSource>,
    ) -> Self {
        Self {
            sessions,
            media,
            context,
        }
    }

    /// Build the run request for one inbound turn.
    ///
    /// The session read slides its TTL. Media download failures and
    /// context fetch failures are logged and skipped; they never fail
    /// the turn.
    ///
    /// # Errors
    /// Returns [`TurnError::SessionNotFound`] when the conversation has
    /// no live session, or the store error when the store is unreachable.
    pub async fn compose(&self, input: TurnInput) -> Result<RunRequest, TurnError> {
        let session = self
            .sessions
            .get(&input.conversation_id)
            .await
            .map_err(TurnError::Session)?
            .ok_or_else(|| TurnError::SessionNotFound(input.conversation_id.clone()))?;

        let media = self.materialize_files(&input.files).await;
        let message = self.prefix_context(&input).await;
        let session_state = serde_json::json!({
            "conversationId": session.conversation_id,
            "resourceIds": session.resource_ids,
        });

        Ok(RunRequest {
            user_id: input.user_id,
            conversation_id: input.conversation_id,
            message_id: input.message_id,
            message,
            media,
            config: session.config,
            session_state,
        })
    }

    async fn materialize_files(&self, files: &[FileRef]) -> TurnMedia {
        let mut media = TurnMedia::default();
        for file in files {
            if file.is_text {
                if let Some(content) = &file.content {
                    media.push(Media::new(
                        file.name.clone(),
                        file.mime_type.clone(),
                        Bytes::from(content.clone()),
                    ));
                    continue;
                }
            }
            let Some(path) = &file.path else {
                tracing::warn!(name = %file.name, "attachment without path or content");
                continue;
            };
            match self.media.download(path).await {
                Ok(content) => {
                    media.push(Media::new(file.name.clone(), file.mime_type.clone(), content));
                }
                Err(e) => {
                    tracing::warn!(path, error = %e, "attachment skipped");
                }
            }
        }
        media
    }

    async fn prefix_context(&self, input: &TurnInput) -> String {
        let mut sections = Vec::new();
        for session_id in &input.context_session_ids {
            match self.context.fetch(session_id).await {
                Ok(Some(transcript)) => sections.push(transcript),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(session_id, error = %e, "context fetch skipped");
                }
            }
        }

        if sections.is_empty() {
            input.message.clone()
        } else {
            format!(
                "Context from previous conversations:\n{}\n\n---\n\n{}",
                sections.join("\n\n"),
                input.message
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use serde_json::Value;

    use agent_relay_core::traits::{ContextError, MediaError, NoopContextSource};
    use agent_relay_session::{
        SessionConfig, backend::memory::MemoryStore, sandbox::NoopSandboxClient,
    };

    use super::*;

    struct FakeMediaStore;

    #[async_trait]
    impl MediaStore for FakeMediaStore {
        async fn download(&self, path: &str) -> Result<Bytes, MediaError> {
            if path.starts_with("missing/") {
                Err(MediaError::NotFound(path.to_string()))
            } else {
                Ok(Bytes::from_static(b"\x89PNG"))
            }
        }
    }

    struct FakeContextSource;

    #[async_trait]
    impl ContextSource for FakeContextSource {
        async fn fetch(&self, session_id: &str) -> Result<Option<String>, ContextError> {
            match session_id {
                "conv-old" => Ok(Some("User asked about trains.".to_string())),
                "conv-broken" => Err(ContextError::Fetch("gateway timeout".to_string())),
                _ => Ok(None),
            }
        }
    }

    fn sessions() -> Arc<SessionStore> {
        Arc::new(SessionStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(NoopSandboxClient),
            SessionConfig::default(),
        ))
    }

    fn composer(
        sessions: Arc<SessionStore>,
        context: Arc<dyn ContextSource>,
    ) -> TurnComposer {
        TurnComposer::new(sessions, Arc::new(FakeMediaStore), context)
    }

    fn input() -> TurnInput {
        TurnInput {
            user_id: "user-1".to_string(),
            conversation_id: "conv-1".to_string(),
            message_id: "msg-1".to_string(),
            message: "hello".to_string(),
            files: Vec::new(),
            context_session_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn missing_session_is_a_typed_error() {
        let composer = composer(sessions(), Arc::new(NoopContextSource));

        let err = composer.compose(input()).await.unwrap_err();
        assert!(matches!(err, TurnError::SessionNotFound(id) if id == "conv-1"));
    }

    #[tokio::test]
    async fn session_config_flows_into_the_request() {
        let sessions = sessions();
        let mut config = HashMap::new();
        config.insert("model".to_string(), Value::String("large".to_string()));
        sessions.create("conv-1", "user-1", config).await.unwrap();

        let composer = composer(sessions, Arc::new(NoopContextSource));
        let request = composer.compose(input()).await.unwrap();

        assert_eq!(request.config["model"], "large");
        // Default capability flags were merged at creation.
        assert_eq!(request.config["enable_browser"], true);
        assert_eq!(request.session_state["conversationId"], "conv-1");
    }

    #[tokio::test]
    async fn files_are_materialized_and_failures_skipped() {
        let sessions = sessions();
        sessions
            .create("conv-1", "user-1", HashMap::new())
            .await
            .unwrap();
        let composer = composer(sessions, Arc::new(NoopContextSource));

        let mut turn = input();
        turn.files = vec![
            FileRef {
                name: "shot.png".to_string(),
                mime_type: "image/png".to_string(),
                path: Some("uploads/shot.png".to_string()),
                content: None,
                is_text: false,
            },
            FileRef {
                name: "notes.txt".to_string(),
                mime_type: "text/plain".to_string(),
                path: None,
                content: Some("remember the milk".to_string()),
                is_text: true,
            },
            FileRef {
                name: "gone.png".to_string(),
                mime_type: "image/png".to_string(),
                path: Some("missing/gone.png".to_string()),
                content: None,
                is_text: false,
            },
        ];

        let request = composer.compose(turn).await.unwrap();

        assert_eq!(request.media.images.len(), 1);
        assert_eq!(request.media.files.len(), 1);
        assert_eq!(request.media.len(), 2);
    }

    #[tokio::test]
    async fn context_is_prepended_and_fetch_failures_skipped() {
        let sessions = sessions();
        sessions
            .create("conv-1", "user-1", HashMap::new())
            .await
            .unwrap();
        let composer = composer(sessions, Arc::new(FakeContextSource));

        let mut turn = input();
        turn.context_session_ids = vec![
            "conv-old".to_string(),
            "conv-broken".to_string(),
            "conv-empty".to_string(),
        ];

        let request = composer.compose(turn).await.unwrap();

        assert!(request.message.starts_with("Context from previous conversations:"));
        assert!(request.message.contains("User asked about trains."));
        assert!(request.message.ends_with("hello"));
    }

    #[tokio::test]
    async fn no_context_leaves_message_untouched() {
        let sessions = sessions();
        sessions
            .create("conv-1", "user-1", HashMap::new())
            .await
            .unwrap();
        let composer = composer(sessions, Arc::new(FakeContextSource));

        let request = composer.compose(input()).await.unwrap();
        assert_eq!(request.message, "hello");
    }
}
