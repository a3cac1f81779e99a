//! Shared store seam.
//!
//! The session store is the only state shared across worker processes, so
//! every operation here is a single atomic key operation. Backends must
//! honor native expiry: a key whose TTL elapsed behaves as absent.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;

#[cfg(feature = "redis")]
pub use redis::RedisStore;

/// Shared store error. Reaching the store failing is an infrastructure
/// error, fatal to the calling request.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("shared store unavailable: {0}")]
    Unavailable(String),
}

/// Low-latency shared key/value store with native expiry and set ops.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Write a value, replacing any prior record, with the given TTL.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Read a value. Expired keys read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Delete a key. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Add a member to a set, refreshing the set's TTL.
    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Remove a member from a set.
    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;

    /// List the members of a set. An absent set reads as empty.
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;
}
