//! Shared pub/sub seam.
//!
//! Channels are uniquely named per request, so implementations only need
//! plain fire-and-forget fan-out; no persistence, no replay.

use async_trait::async_trait;
use thiserror::Error;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "memory")]
pub use memory::MemoryPubSub;

#[cfg(feature = "redis")]
pub use redis::RedisPubSub;

/// Pub/sub layer error.
#[derive(Debug, Error)]
pub enum PubSubError {
    #[error("pub/sub layer unavailable: {0}")]
    Unavailable(String),
}

/// Publish/subscribe over uniquely-named channels.
#[async_trait]
pub trait PubSub: Send + Sync {
    /// Publish a payload. Publishing to a channel nobody listens on
    /// succeeds and drops the message.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), PubSubError>;

    /// Open a subscription on a channel.
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>, PubSubError>;
}

/// An open subscription handle.
///
/// Holders must call [`Subscription::close`] on every exit path; a
/// subscription left open is a leak.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next payload. `None` means the channel was torn down.
    async fn next(&mut self) -> Option<String>;

    /// Release the subscription.
    async fn close(self: Box<Self>) -> Result<(), PubSubError>;
}
