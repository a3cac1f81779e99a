//! Redis pub/sub backend (feature-gated).

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;

use super::{PubSub, PubSubError, Subscription};

fn redis_err(e: redis::RedisError) -> PubSubError {
    PubSubError::Unavailable(e.to_string())
}

/// Redis pub/sub implementation.
///
/// Publishing goes through a shared multiplexed connection; each
/// subscription gets its own dedicated connection, as Redis requires.
#[derive(Clone)]
pub struct RedisPubSub {
    client: redis::Client,
    conn: ConnectionManager,
}

impl RedisPubSub {
    /// Connect to a Redis instance.
    ///
    /// # Errors
    /// Returns error if the URL is invalid or the connection fails.
    pub async fn connect(url: &str) -> Result<Self, PubSubError> {
        let client = redis::Client::open(url).map_err(redis_err)?;
        let conn = client.get_connection_manager().await.map_err(redis_err)?;
        Ok(Self { client, conn })
    }
}

#[async_trait]
impl PubSub for RedisPubSub {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), PubSubError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::AsyncCommands::publish(&mut conn, channel, payload)
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>, PubSubError> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(redis_err)?;
        pubsub.subscribe(channel).await.map_err(redis_err)?;
        Ok(Box::new(RedisSubscription {
            channel: channel.to_string(),
            pubsub,
        }))
    }
}

struct RedisSubscription {
    channel: String,
    pubsub: redis::aio::PubSub,
}

#[async_trait]
impl Subscription for RedisSubscription {
    async fn next(&mut self) -> Option<String> {
        loop {
            let message = self.pubsub.on_message().next().await?;
            match message.get_payload::<String>() {
                Ok(payload) => return Some(payload),
                Err(e) => {
                    tracing::warn!(channel = %self.channel, error = %e, "undecodable payload");
                }
            }
        }
    }

    async fn close(mut self: Box<Self>) -> Result<(), PubSubError> {
        self.pubsub
            .unsubscribe(&self.channel)
            .await
            .map_err(redis_err)
    }
}
