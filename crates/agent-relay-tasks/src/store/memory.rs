//! In-memory task store for tests and single-process deployments.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;

use super::{TaskError, TaskStore};
use crate::task::{Task, TaskStatus};

/// In-memory task store. The claim transition happens under one lock,
/// which gives the same atomicity as the SQL backend's conditional update.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<HashMap<String, Task>>,
}

impl MemoryTaskStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err<T>(e: PoisonError<T>) -> TaskError {
    TaskError::Unavailable(e.to_string())
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create(&self, task: Task) -> Result<(), TaskError> {
        self.tasks
            .lock()
            .map_err(lock_err)?
            .insert(task.id.clone(), task);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Task, TaskError> {
        self.tasks
            .lock()
            .map_err(lock_err)?
            .get(id)
            .cloned()
            .ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    async fn list_pending(&self) -> Result<Vec<Task>, TaskError> {
        Ok(self
            .tasks
            .lock()
            .map_err(lock_err)?
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .cloned()
            .collect())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Task>, TaskError> {
        Ok(self
            .tasks
            .lock()
            .map_err(lock_err)?
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn claim(&self, id: &str) -> Result<bool, TaskError> {
        let mut tasks = self.tasks.lock().map_err(lock_err)?;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        if task.status == TaskStatus::Pending {
            task.status = TaskStatus::InProgress;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn release(&self, id: &str) -> Result<(), TaskError> {
        let mut tasks = self.tasks.lock().map_err(lock_err)?;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        if task.status == TaskStatus::InProgress {
            task.status = TaskStatus::Pending;
        }
        Ok(())
    }

    async fn save_work(&self, id: &str, work: &str) -> Result<(), TaskError> {
        let mut tasks = self.tasks.lock().map_err(lock_err)?;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        task.task_work = Some(work.to_string());
        Ok(())
    }

    async fn complete(&self, id: &str) -> Result<(), TaskError> {
        let mut tasks = self.tasks.lock().map_err(lock_err)?;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        task.status = TaskStatus::Completed;
        Ok(())
    }

    async fn cancel(&self, id: &str) -> Result<(), TaskError> {
        let mut tasks = self.tasks.lock().map_err(lock_err)?;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        if task.status != TaskStatus::Completed {
            task.status = TaskStatus::Cancelled;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claim_is_conditional() {
        let store = MemoryTaskStore::new();
        let task = Task::new("user-1", "first");
        let id = task.id.clone();
        store.create(task).await.unwrap();

        assert!(store.claim(&id).await.unwrap());
        // A second claim loses the race.
        assert!(!store.claim(&id).await.unwrap());
        assert_eq!(store.get(&id).await.unwrap().status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn release_restores_claim_eligibility() {
        let store = MemoryTaskStore::new();
        let task = Task::new("user-1", "retryable");
        let id = task.id.clone();
        store.create(task).await.unwrap();

        assert!(store.claim(&id).await.unwrap());
        store.release(&id).await.unwrap();

        assert_eq!(store.get(&id).await.unwrap().status, TaskStatus::Pending);
        assert!(store.claim(&id).await.unwrap());
    }

    #[tokio::test]
    async fn work_is_saved_before_completion() {
        let store = MemoryTaskStore::new();
        let task = Task::new("user-1", "produce a report");
        let id = task.id.clone();
        store.create(task).await.unwrap();

        store.claim(&id).await.unwrap();
        store.save_work(&id, "the report").await.unwrap();
        store.complete(&id).await.unwrap();

        let task = store.get(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.task_work.as_deref(), Some("the report"));
    }

    #[tokio::test]
    async fn listing_filters_by_status_and_user() {
        let store = MemoryTaskStore::new();
        let a = Task::new("user-1", "a");
        let b = Task::new("user-2", "b");
        let claimed = a.id.clone();
        store.create(a).await.unwrap();
        store.create(b).await.unwrap();

        assert_eq!(store.list_pending().await.unwrap().len(), 2);
        store.claim(&claimed).await.unwrap();
        assert_eq!(store.list_pending().await.unwrap().len(), 1);
        assert_eq!(store.list_for_user("user-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancel_is_terminal_but_spares_completed() {
        let store = MemoryTaskStore::new();
        let task = Task::new("user-1", "done already");
        let id = task.id.clone();
        store.create(task).await.unwrap();
        store.claim(&id).await.unwrap();
        store.complete(&id).await.unwrap();

        store.cancel(&id).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().status, TaskStatus::Completed);

        let other = Task::new("user-1", "still open");
        let other_id = other.id.clone();
        store.create(other).await.unwrap();
        store.cancel(&other_id).await.unwrap();
        assert_eq!(
            store.get(&other_id).await.unwrap().status,
            TaskStatus::Cancelled
        );
        assert!(!store.claim(&other_id).await.unwrap());
    }
}
