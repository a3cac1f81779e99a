//! Client-facing transport layer.
//!
//! Provides:
//! - Wire protocol (JSON over the live connection)
//! - `AppContext` - Explicit dependency bundle passed into every handler
//! - WebSocket transport (feature: websocket)
//! - HTTP media store client

pub mod context;
pub mod http;
pub mod protocol;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use context::AppContext;
pub use http::HttpMediaStore;
pub use protocol::ClientMessage;
