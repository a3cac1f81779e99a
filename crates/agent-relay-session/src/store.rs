//! Per-conversation session lifecycle.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::backend::{SharedStore, StoreError};
use crate::sandbox::SandboxClient;

/// Capability flags every new session starts with.
const DEFAULT_CAPABILITIES: [&str; 6] = [
    "enable_browser",
    "enable_search",
    "enable_email",
    "enable_drive",
    "enable_deploy",
    "enable_storage",
];

/// Upper bound on index entries reconciled per sweep call.
const SWEEP_BATCH: usize = 100;

/// Session store configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sliding record TTL.
    pub ttl: Duration,
    /// Maximum attached resource ids per session.
    pub max_resources: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(2 * 60 * 60),
            max_resources: 4,
        }
    }
}

/// One conversation's ephemeral session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Owning conversation id.
    pub conversation_id: String,
    /// Owning user id.
    pub user_id: String,
    /// Opaque per-session configuration.
    pub config: HashMap<String, Value>,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: i64,
    /// Last successful read (Unix epoch seconds).
    pub last_accessed_at: i64,
    /// Attached external resource ids, oldest first.
    #[serde(default)]
    pub resource_ids: Vec<String>,
}

/// Session store error.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("corrupt session record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn session_key(conversation_id: &str) -> String {
    format!("session:{conversation_id}")
}

fn user_index_key(user_id: &str) -> String {
    format!("user-sessions:{user_id}")
}

/// Ephemeral, TTL-based session store shared across all workers.
pub struct SessionStore {
    store: Arc<dyn SharedStore>,
    sandboxes: Arc<dyn SandboxClient>,
    config: SessionConfig,
}

impl SessionStore {
    /// Create a store over the given shared backend.
    pub fn new(
        store: Arc<dyn SharedStore>,
        sandboxes: Arc<dyn SandboxClient>,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            sandboxes,
            config,
        }
    }

    /// Create a session record, overwriting any stale prior record.
    ///
    /// The default capability flags are merged into `config`, and the
    /// conversation id is added to the owning user's index set.
    ///
    /// # Errors
    /// Returns error if the shared store is unreachable.
    pub async fn create(
        &self,
        conversation_id: &str,
        user_id: &str,
        mut config: HashMap<String, Value>,
    ) -> Result<Session, SessionError> {
        tracing::info!(conversation_id, "creating session record");

        for capability in DEFAULT_CAPABILITIES {
            config.insert(capability.to_string(), Value::Bool(true));
        }

        let timestamp = now();
        let session = Session {
            conversation_id: conversation_id.to_string(),
            user_id: user_id.to_string(),
            config,
            created_at: timestamp,
            last_accessed_at: timestamp,
            resource_ids: Vec::new(),
        };

        self.write(&session).await?;
        self.store
            .set_add(&user_index_key(user_id), conversation_id, self.config.ttl)
            .await?;

        Ok(session)
    }

    /// Look up a session, refreshing its TTL and last-accessed time.
    ///
    /// A miss is not fatal; it means the caller needs to create the
    /// session.
    ///
    /// # Errors
    /// Returns error if the shared store is unreachable.
    pub async fn get(&self, conversation_id: &str) -> Result<Option<Session>, SessionError> {
        let Some(mut session) = self.read(conversation_id).await? else {
            return Ok(None);
        };

        session.last_accessed_at = now();
        self.write(&session).await?;
        Ok(Some(session))
    }

    /// Terminate a session and tear down its attached resources.
    ///
    /// Safe to call twice: terminating an absent session is a no-op.
    /// Resource teardown is best-effort; failures are logged and skipped.
    ///
    /// # Errors
    /// Returns error if the shared store is unreachable.
    pub async fn terminate(&self, conversation_id: &str) -> Result<(), SessionError> {
        let Some(session) = self.read(conversation_id).await? else {
            return Ok(());
        };

        for resource_id in &session.resource_ids {
            self.teardown_resource(resource_id).await;
        }

        self.store
            .set_remove(&user_index_key(&session.user_id), conversation_id)
            .await?;
        self.store.delete(&session_key(conversation_id)).await?;

        tracing::info!(conversation_id, "terminated session");
        Ok(())
    }

    /// Attach an external resource id to a session.
    ///
    /// At the cap, the oldest id is evicted first and its teardown
    /// requested before the new id is accepted.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if the session does not exist.
    pub async fn attach_resource(
        &self,
        conversation_id: &str,
        resource_id: &str,
    ) -> Result<(), SessionError> {
        let mut session = self
            .read(conversation_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(conversation_id.to_string()))?;

        if session.resource_ids.len() >= self.config.max_resources {
            let evicted = session.resource_ids.remove(0);
            tracing::info!(conversation_id, resource_id = %evicted, "evicting oldest resource");
            self.teardown_resource(&evicted).await;
        }

        session.resource_ids.push(resource_id.to_string());
        self.write(&session).await
    }

    /// Detach a resource id from a session without tearing it down.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if the session does not exist.
    pub async fn detach_resource(
        &self,
        conversation_id: &str,
        resource_id: &str,
    ) -> Result<(), SessionError> {
        let mut session = self
            .read(conversation_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(conversation_id.to_string()))?;

        session.resource_ids.retain(|id| id != resource_id);
        self.write(&session).await
    }

    /// Reconcile a user's index set against actual record existence.
    ///
    /// The index may hold ids whose primary record already expired; those
    /// dangling entries are removed, at most [`SWEEP_BATCH`] per call.
    ///
    /// # Errors
    /// Returns error if the shared store is unreachable.
    pub async fn sweep(&self, user_id: &str) -> Result<usize, SessionError> {
        let index_key = user_index_key(user_id);
        let members = self.store.set_members(&index_key).await?;

        let mut removed = 0;
        for conversation_id in members.into_iter().take(SWEEP_BATCH) {
            if self.store.get(&session_key(&conversation_id)).await?.is_none() {
                self.store.set_remove(&index_key, &conversation_id).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::debug!(user_id, removed, "swept dangling session index entries");
        }
        Ok(removed)
    }

    /// Read a record without refreshing its TTL.
    async fn read(&self, conversation_id: &str) -> Result<Option<Session>, SessionError> {
        match self.store.get(&session_key(conversation_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Rewrite a record with a full TTL.
    async fn write(&self, session: &Session) -> Result<(), SessionError> {
        let raw = serde_json::to_string(session)?;
        self.store
            .set_with_ttl(&session_key(&session.conversation_id), &raw, self.config.ttl)
            .await?;
        Ok(())
    }

    async fn teardown_resource(&self, resource_id: &str) {
        if let Err(e) = self.sandboxes.teardown(resource_id).await {
            tracing::warn!(resource_id, error = %e, "resource teardown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::backend::memory::MemoryStore;
    use crate::sandbox::SandboxError;

    #[derive(Default)]
    struct RecordingSandbox {
        torn_down: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SandboxClient for RecordingSandbox {
        async fn teardown(&self, resource_id: &str) -> Result<(), SandboxError> {
            self.torn_down
                .lock()
                .unwrap()
                .push(resource_id.to_string());
            Ok(())
        }
    }

    struct FailingSandbox;

    #[async_trait]
    impl SandboxClient for FailingSandbox {
        async fn teardown(&self, _resource_id: &str) -> Result<(), SandboxError> {
            Err(SandboxError::Status(502))
        }
    }

    fn store_with(
        sandboxes: Arc<dyn SandboxClient>,
        config: SessionConfig,
    ) -> (SessionStore, Arc<MemoryStore>) {
        let backend = Arc::new(MemoryStore::new());
        let store = SessionStore::new(backend.clone(), sandboxes, config);
        (store, backend)
    }

    fn default_store() -> SessionStore {
        SessionStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingSandbox::default()),
            SessionConfig::default(),
        )
    }

    #[tokio::test]
    async fn create_then_get_round_trips_config() {
        let store = default_store();
        let mut config = HashMap::new();
        config.insert("model".to_string(), Value::String("fast".to_string()));

        store.create("conv-1", "user-1", config).await.unwrap();

        let session = store.get("conv-1").await.unwrap().unwrap();
        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.config["model"], Value::String("fast".to_string()));
        // Default capability flags are merged in.
        assert_eq!(session.config["enable_browser"], Value::Bool(true));
        assert_eq!(session.config["enable_storage"], Value::Bool(true));
    }

    #[tokio::test]
    async fn get_miss_is_not_an_error() {
        let store = default_store();
        assert!(store.get("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_slides_the_ttl() {
        let config = SessionConfig {
            ttl: Duration::from_millis(120),
            ..SessionConfig::default()
        };
        let (store, _) = store_with(Arc::new(RecordingSandbox::default()), config);

        store.create("conv-1", "user-1", HashMap::new()).await.unwrap();

        // Read just before expiry; each read must reset the full window.
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(70)).await;
            assert!(store.get("conv-1").await.unwrap().is_some());
        }

        // Without further reads the record finally expires.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(store.get("conv-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn attach_evicts_oldest_beyond_cap() {
        let sandbox = Arc::new(RecordingSandbox::default());
        let config = SessionConfig {
            max_resources: 3,
            ..SessionConfig::default()
        };
        let (store, _) = store_with(sandbox.clone(), config);

        store.create("conv-1", "user-1", HashMap::new()).await.unwrap();
        for i in 0..4 {
            store
                .attach_resource("conv-1", &format!("sbx-{i}"))
                .await
                .unwrap();
        }

        let session = store.get("conv-1").await.unwrap().unwrap();
        assert_eq!(session.resource_ids, vec!["sbx-1", "sbx-2", "sbx-3"]);
        // Exactly one teardown, for the evicted oldest id.
        assert_eq!(*sandbox.torn_down.lock().unwrap(), vec!["sbx-0"]);
    }

    #[tokio::test]
    async fn attach_to_missing_session_fails() {
        let store = default_store();
        let err = store.attach_resource("absent", "sbx-0").await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn terminate_tears_down_and_is_idempotent() {
        let sandbox = Arc::new(RecordingSandbox::default());
        let (store, _) = store_with(sandbox.clone(), SessionConfig::default());

        store.create("conv-1", "user-1", HashMap::new()).await.unwrap();
        store.attach_resource("conv-1", "sbx-0").await.unwrap();
        store.attach_resource("conv-1", "sbx-1").await.unwrap();

        store.terminate("conv-1").await.unwrap();
        assert!(store.get("conv-1").await.unwrap().is_none());
        assert_eq!(*sandbox.torn_down.lock().unwrap(), vec!["sbx-0", "sbx-1"]);

        // Second call is a no-op.
        store.terminate("conv-1").await.unwrap();
        assert_eq!(sandbox.torn_down.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn terminate_survives_teardown_failures() {
        let (store, _) = store_with(Arc::new(FailingSandbox), SessionConfig::default());

        store.create("conv-1", "user-1", HashMap::new()).await.unwrap();
        store.attach_resource("conv-1", "sbx-0").await.unwrap();

        // Teardown failure is logged, not propagated.
        store.terminate("conv-1").await.unwrap();
        assert!(store.get("conv-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn detach_removes_resource() {
        let store = default_store();
        store.create("conv-1", "user-1", HashMap::new()).await.unwrap();
        store.attach_resource("conv-1", "sbx-0").await.unwrap();
        store.attach_resource("conv-1", "sbx-1").await.unwrap();

        store.detach_resource("conv-1", "sbx-0").await.unwrap();

        let session = store.get("conv-1").await.unwrap().unwrap();
        assert_eq!(session.resource_ids, vec!["sbx-1"]);
    }

    #[tokio::test]
    async fn sweep_removes_dangling_index_entries() {
        let config = SessionConfig {
            ttl: Duration::from_millis(100),
            ..SessionConfig::default()
        };
        let backend = Arc::new(MemoryStore::new());
        let store = SessionStore::new(
            backend.clone(),
            Arc::new(RecordingSandbox::default()),
            config,
        );

        store.create("conv-1", "user-1", HashMap::new()).await.unwrap();
        store.create("conv-2", "user-1", HashMap::new()).await.unwrap();

        // Keep conv-2 alive past conv-1's expiry, and pin the index set so
        // only the primary record of conv-1 lapses.
        tokio::time::sleep(Duration::from_millis(60)).await;
        store.get("conv-2").await.unwrap();
        backend
            .set_add("user-sessions:user-1", "conv-2", Duration::from_secs(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(70)).await;

        let removed = store.sweep("user-1").await.unwrap();
        assert_eq!(removed, 1);

        let members = backend.set_members("user-sessions:user-1").await.unwrap();
        assert_eq!(members, vec!["conv-2".to_string()]);
    }
}
