//! Request/response correlation for commands executed inside a
//! client-controlled environment.
//!
//! Many stateless workers share no memory, so the reply to a command may
//! arrive at a different worker than the one that sent it. Correlation
//! happens over the shared pub/sub layer on a channel named by the
//! request id; the issuing worker blocks (cooperatively) on that channel.

use std::{sync::Arc, time::Duration};

use agent_relay_core::{
    ClientEvent, Media, MediaStore,
    traits::{ClientSink, SinkError},
};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::pubsub::{PubSub, PubSubError, Subscription};

/// Payload key referencing an out-of-band artifact to materialize.
pub const ARTIFACT_PATH_KEY: &str = "artifact_path";

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Reply deadline for ordinary commands.
    pub timeout: Duration,
    /// Reply deadline for long-running remote executions.
    pub long_timeout: Duration,
    /// Actions granted the long deadline.
    pub long_running_actions: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            long_timeout: Duration::from_secs(300),
            long_running_actions: vec!["execute".to_string()],
        }
    }
}

/// A command to execute on the client.
#[derive(Debug, Clone)]
pub struct RemoteCommand {
    /// Action name, e.g. `navigate`.
    pub action: String,
    /// Action parameters, flattened into the outbound payload.
    pub params: serde_json::Map<String, Value>,
}

impl RemoteCommand {
    /// Build a command with no parameters.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params: serde_json::Map::new(),
        }
    }

    /// Add one parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Result of a remote command.
#[derive(Debug)]
pub struct CommandOutcome {
    /// The textual reply payload, artifact reference removed.
    pub payload: Value,
    /// Materialized binary artifact, when the reply referenced one.
    pub artifact: Option<Media>,
}

/// Bridge error.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("remote command '{action}' timed out after {timeout:?}")]
    Timeout { action: String, timeout: Duration },
    #[error("response channel closed before a reply arrived")]
    ChannelClosed,
    #[error("malformed response payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    PubSub(#[from] PubSubError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Channel carrying the reply for one request id.
#[must_use]
pub fn response_channel(request_id: &str) -> String {
    format!("command-response:{request_id}")
}

/// Correlates outbound client commands with their out-of-band replies.
pub struct CommandBridge {
    pubsub: Arc<dyn PubSub>,
    media: Arc<dyn MediaStore>,
    config: BridgeConfig,
}

impl CommandBridge {
    /// Create a bridge over the given pub/sub layer.
    pub fn new(pubsub: Arc<dyn PubSub>, media: Arc<dyn MediaStore>, config: BridgeConfig) -> Self {
        Self {
            pubsub,
            media,
            config,
        }
    }

    /// Send a command to the client and await its reply.
    ///
    /// The subscription is opened before the command is pushed, so a reply
    /// racing the send always finds a listener, and is released on every
    /// exit path. No ordering is guaranteed across outstanding commands;
    /// correlation is purely per request id.
    ///
    /// # Errors
    /// Returns [`BridgeError::Timeout`] if no reply arrives in time; this
    /// is a typed failure the caller can react to, not a crash.
    pub async fn dispatch(
        &self,
        sink: &dyn ClientSink,
        command: RemoteCommand,
    ) -> Result<CommandOutcome, BridgeError> {
        let request_id = Uuid::new_v4().to_string();
        let channel = response_channel(&request_id);

        let mut subscription = self.pubsub.subscribe(&channel).await?;
        let result = self
            .exchange(sink, subscription.as_mut(), &command, &request_id)
            .await;

        if let Err(e) = subscription.close().await {
            tracing::warn!(request_id, error = %e, "failed to release subscription");
        }
        result
    }

    async fn exchange(
        &self,
        sink: &dyn ClientSink,
        subscription: &mut dyn Subscription,
        command: &RemoteCommand,
        request_id: &str,
    ) -> Result<CommandOutcome, BridgeError> {
        sink.send(ClientEvent::Command {
            action: command.action.clone(),
            params: command.params.clone(),
            request_id: request_id.to_string(),
        })
        .await?;

        let timeout = self.deadline_for(&command.action);
        match tokio::time::timeout(timeout, subscription.next()).await {
            Ok(Some(raw)) => {
                let payload: Value = serde_json::from_str(&raw)?;
                Ok(self.materialize(payload).await)
            }
            Ok(None) => Err(BridgeError::ChannelClosed),
            Err(_) => Err(BridgeError::Timeout {
                action: command.action.clone(),
                timeout,
            }),
        }
    }

    /// Resolve an artifact reference in the reply payload, if present.
    ///
    /// Fetch failure degrades to a textual error annotation; it never
    /// fails the command.
    async fn materialize(&self, mut payload: Value) -> CommandOutcome {
        let path = payload
            .as_object_mut()
            .and_then(|object| object.remove(ARTIFACT_PATH_KEY))
            .and_then(|value| value.as_str().map(ToString::to_string));

        let Some(path) = path else {
            return CommandOutcome {
                payload,
                artifact: None,
            };
        };

        match self.media.download(&path).await {
            Ok(content) => CommandOutcome {
                payload,
                artifact: Some(Media::new(path.clone(), mime_for_path(&path), content)),
            },
            Err(e) => {
                tracing::warn!(path, error = %e, "artifact fetch failed");
                if let Some(object) = payload.as_object_mut() {
                    object.insert(
                        "error".to_string(),
                        Value::String(format!("could not retrieve artifact at {path}")),
                    );
                }
                CommandOutcome {
                    payload,
                    artifact: None,
                }
            }
        }
    }

    fn deadline_for(&self, action: &str) -> Duration {
        if self
            .config
            .long_running_actions
            .iter()
            .any(|long| long == action)
        {
            self.config.long_timeout
        } else {
            self.config.timeout
        }
    }
}

fn mime_for_path(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
