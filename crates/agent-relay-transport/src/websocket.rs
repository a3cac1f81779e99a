//! WebSocket transport for conversational clients.

use std::sync::Arc;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use agent_relay_bridge::bridge::response_channel;
use agent_relay_core::{
    ClientEvent,
    traits::{ClientSink, SinkError},
};
use agent_relay_stream::TurnInput;

use crate::context::AppContext;
use crate::protocol::ClientMessage;

/// Push channel backed by the connection's outbound queue.
#[derive(Clone)]
pub struct WsClientSink {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl WsClientSink {
    /// Wrap an outbound queue.
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<ClientEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait::async_trait]
impl ClientSink for WsClientSink {
    async fn send(&self, event: ClientEvent) -> Result<(), SinkError> {
        self.tx.send(event).map_err(|_| SinkError::Closed)
    }
}

/// WebSocket upgrade handler.
///
/// Use this as an Axum route handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(ctx): State<Arc<AppContext>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, ctx))
}

async fn handle_socket(socket: WebSocket, ctx: Arc<AppContext>) {
    let (mut sender, mut receiver) = socket.split();

    // Channel for sending events to the client
    let (tx, mut rx) = mpsc::unbounded_channel::<ClientEvent>();
    let sink = Arc::new(WsClientSink::new(tx));

    // Spawn task to forward events to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("failed to serialize event: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::error!("websocket error: {e}");
                break;
            }
        };

        let client_msg: ClientMessage = match serde_json::from_str(&msg) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("invalid client message: {e}");
                let _ = sink
                    .send(ClientEvent::Error {
                        message: format!("Invalid message: {e}"),
                    })
                    .await;
                continue;
            }
        };

        handle_message(&ctx, &sink, client_msg).await;
    }

    send_task.abort();
}

/// Dispatch one parsed client message.
pub async fn handle_message(
    ctx: &Arc<AppContext>,
    sink: &Arc<WsClientSink>,
    message: ClientMessage,
) {
    match message {
        ClientMessage::Ping => {
            let _ = sink.send(ClientEvent::Pong).await;
        }
        ClientMessage::BrowserCommandResult { request_id, result } => {
            let channel = response_channel(&request_id);
            if let Err(e) = ctx.pubsub.publish(&channel, &result.to_string()).await {
                tracing::error!(request_id, error = %e, "command reply dropped");
            }
        }
        ClientMessage::TerminateSession {
            access_token,
            conversation_id,
        } => {
            if authenticate(ctx, sink, &access_token).await.is_none() {
                return;
            }
            match ctx.sessions.terminate(&conversation_id).await {
                Ok(()) => {
                    let _ = sink
                        .send(ClientEvent::Status {
                            message: "Session terminated".to_string(),
                        })
                        .await;
                }
                Err(e) => {
                    tracing::error!(conversation_id, error = %e, "terminate failed");
                    let _ = sink
                        .send(ClientEvent::Error {
                            message: "Could not terminate the session.".to_string(),
                        })
                        .await;
                }
            }
        }
        ClientMessage::SendMessage {
            access_token,
            conversation_id,
            message,
            files,
            config,
            context_session_ids,
            id,
        } => {
            let Some(user) = authenticate(ctx, sink, &access_token).await else {
                return;
            };

            // First message of a conversation creates its session.
            match ctx.sessions.get(&conversation_id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    if let Err(e) = ctx
                        .sessions
                        .create(&conversation_id, &user.user_id, config.unwrap_or_default())
                        .await
                    {
                        tracing::error!(conversation_id, error = %e, "session create failed");
                        let _ = sink
                            .send(ClientEvent::Error {
                                message: "Could not start a session.".to_string(),
                            })
                            .await;
                        return;
                    }
                }
                Err(e) => {
                    tracing::error!(conversation_id, error = %e, "session lookup failed");
                    let _ = sink
                        .send(ClientEvent::Error {
                            message: "Session store unavailable.".to_string(),
                        })
                        .await;
                    return;
                }
            }

            let input = TurnInput {
                user_id: user.user_id,
                conversation_id,
                message_id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                message,
                files,
                context_session_ids,
            };

            // One task per turn; a slow run never blocks the read loop.
            let ctx = Arc::clone(ctx);
            let sink = Arc::clone(sink);
            tokio::spawn(async move {
                let message_id = input.message_id.clone();
                match ctx.composer.compose(input).await {
                    Ok(request) => ctx.multiplexer.relay(sink.as_ref(), request).await,
                    Err(e) => {
                        tracing::error!(message_id, error = %e, "turn preparation failed");
                        let _ = sink
                            .send(ClientEvent::Error {
                                message: "Could not process your message.".to_string(),
                            })
                            .await;
                        let _ = sink.send(ClientEvent::done(&message_id)).await;
                    }
                }
            });
        }
    }
}

async fn authenticate(
    ctx: &Arc<AppContext>,
    sink: &Arc<WsClientSink>,
    token: &str,
) -> Option<agent_relay_core::AuthenticatedUser> {
    match ctx.verifier.verify(token).await {
        Ok(user) => Some(user),
        Err(kind) => {
            // Auth failures never tear the session down.
            let _ = sink
                .send(ClientEvent::Error {
                    message: format!("Authentication failed: {kind}"),
                })
                .await;
            None
        }
    }
}

/// Create the WebSocket router.
#[must_use]
pub fn router(ctx: Arc<AppContext>) -> axum::Router {
    axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(ctx)
}
