//! In-memory shared store.
//!
//! Useful for development, tests, and single-process deployments. Expiry
//! is enforced lazily on access.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::{Duration, Instant},
};

use async_trait::async_trait;

use super::{SharedStore, StoreError};

struct ValueEntry {
    value: String,
    expires_at: Instant,
}

struct SetEntry {
    members: HashSet<String>,
    expires_at: Instant,
}

/// In-memory store implementation.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, ValueEntry>>,
    sets: Mutex<HashMap<String, SetEntry>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err<T>(e: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.values.lock().map_err(lock_err)?.insert(
            key.to_string(),
            ValueEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut values = self.values.lock().map_err(lock_err)?;
        match values.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                values.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.values.lock().map_err(lock_err)?.remove(key);
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut sets = self.sets.lock().map_err(lock_err)?;
        let now = Instant::now();
        let entry = sets.entry(key.to_string()).or_insert_with(|| SetEntry {
            members: HashSet::new(),
            expires_at: now + ttl,
        });
        if entry.expires_at <= now {
            entry.members.clear();
        }
        entry.members.insert(member.to_string());
        entry.expires_at = now + ttl;
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        if let Some(entry) = self.sets.lock().map_err(lock_err)?.get_mut(key) {
            entry.members.remove(member);
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut sets = self.sets.lock().map_err(lock_err)?;
        match sets.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                Ok(entry.members.iter().cloned().collect())
            }
            Some(_) => {
                sets.remove(key);
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn values_expire() {
        let store = MemoryStore::new();
        store
            .set_with_ttl("k", "v", Duration::from_millis(40))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn sets_add_remove_and_list() {
        let store = MemoryStore::new();
        store
            .set_add("s", "a", Duration::from_secs(10))
            .await
            .unwrap();
        store
            .set_add("s", "b", Duration::from_secs(10))
            .await
            .unwrap();

        let mut members = store.set_members("s").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);

        store.set_remove("s", "a").await.unwrap();
        assert_eq!(store.set_members("s").await.unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store.delete("missing").await.unwrap();
        store
            .set_with_ttl("k", "v", Duration::from_secs(10))
            .await
            .unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
