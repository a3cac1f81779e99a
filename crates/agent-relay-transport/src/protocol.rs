//! Wire protocol for client-server communication.
//!
//! The server-to-client side is `ClientEvent` from the core crate; this
//! module defines the client-to-server messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use agent_relay_core::FileRef;

/// Message from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientMessage {
    /// One conversational turn.
    #[serde(rename_all = "camelCase")]
    SendMessage {
        access_token: String,
        conversation_id: String,
        message: String,
        #[serde(default)]
        files: Vec<FileRef>,
        /// Per-session configuration, applied on session creation.
        #[serde(default)]
        config: Option<HashMap<String, Value>>,
        /// Earlier conversations to pull context from.
        #[serde(default)]
        context_session_ids: Vec<String>,
        /// Client-chosen message id; generated when absent.
        #[serde(default)]
        id: Option<String>,
    },
    /// Tear the conversation's session down.
    #[serde(rename_all = "camelCase")]
    TerminateSession {
        access_token: String,
        conversation_id: String,
    },
    /// Reply to a remote command previously pushed to this client.
    #[serde(rename_all = "camelCase")]
    BrowserCommandResult { request_id: String, result: Value },
    /// Ping for keepalive.
    Ping,
}
