//! In-memory pub/sub for tests and single-process deployments.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{PubSub, PubSubError, Subscription};

type Channels = Arc<Mutex<HashMap<String, broadcast::Sender<String>>>>;

/// In-memory pub/sub implementation.
#[derive(Default, Clone)]
pub struct MemoryPubSub {
    channels: Channels,
}

impl MemoryPubSub {
    /// Create an empty pub/sub layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of channels with at least one live subscriber.
    ///
    /// # Panics
    /// Panics if the inner lock is poisoned.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.lock().unwrap().len()
    }
}

fn lock_err<T>(e: std::sync::PoisonError<T>) -> PubSubError {
    PubSubError::Unavailable(e.to_string())
}

#[async_trait]
impl PubSub for MemoryPubSub {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), PubSubError> {
        let channels = self.channels.lock().map_err(lock_err)?;
        if let Some(sender) = channels.get(channel) {
            // No receivers is fine; the message is simply dropped.
            let _ = sender.send(payload.to_string());
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>, PubSubError> {
        let mut channels = self.channels.lock().map_err(lock_err)?;
        let sender = channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(64).0);
        let receiver = sender.subscribe();

        Ok(Box::new(MemorySubscription {
            channel: channel.to_string(),
            receiver,
            channels: Arc::clone(&self.channels),
        }))
    }
}

struct MemorySubscription {
    channel: String,
    receiver: broadcast::Receiver<String>,
    channels: Channels,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next(&mut self) -> Option<String> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(channel = %self.channel, skipped, "subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<(), PubSubError> {
        let Self {
            channel,
            receiver,
            channels,
        } = *self;
        drop(receiver);

        let mut channels = channels.lock().map_err(lock_err)?;
        if channels
            .get(&channel)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&channel);
        }
        Ok(())
    }
}
