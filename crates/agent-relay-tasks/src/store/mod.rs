//! Persisted task storage seam.

use async_trait::async_trait;
use thiserror::Error;

use crate::task::Task;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "memory")]
pub use memory::MemoryTaskStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteTaskStore;

/// Task store error.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("task store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt task record: {0}")]
    Corrupt(String),
}

/// Persisted task table.
///
/// `claim` is the only cross-instance mutual-exclusion mechanism; every
/// backend must implement it as a single atomic conditional transition,
/// never a read followed by a write.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new task.
    async fn create(&self, task: Task) -> Result<(), TaskError>;

    /// Fetch one task by id.
    async fn get(&self, id: &str) -> Result<Task, TaskError>;

    /// All tasks currently pending, across users.
    async fn list_pending(&self) -> Result<Vec<Task>, TaskError>;

    /// All tasks owned by one user.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Task>, TaskError>;

    /// Atomically transition pending -> in-progress.
    ///
    /// Returns `false` when the task was not pending (already claimed,
    /// finished, or cancelled); that is a normal race outcome, not an
    /// error.
    async fn claim(&self, id: &str) -> Result<bool, TaskError>;

    /// Roll an in-progress task back to pending.
    async fn release(&self, id: &str) -> Result<(), TaskError>;

    /// Persist the work artifact for a task.
    async fn save_work(&self, id: &str, work: &str) -> Result<(), TaskError>;

    /// Transition an in-progress task to completed.
    async fn complete(&self, id: &str) -> Result<(), TaskError>;

    /// Cancel a task. Terminal; completed tasks are left untouched.
    async fn cancel(&self, id: &str) -> Result<(), TaskError>;
}
