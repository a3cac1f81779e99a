//! Task execution.
//!
//! One claimed task is driven through an isolated, non-streamed agent
//! run. The executor, not the scheduler, saves the work artifact and
//! flips the task to completed, so a scheduler bug can never mark
//! unfinished work as done.

use std::{collections::HashMap, sync::Arc};

use futures::StreamExt;
use thiserror::Error;

use agent_relay_core::{
    AgentRunner, ClientEvent, RunRequest, TaskRunStatus, TurnMedia,
    traits::{ClientSink, RunError},
};
use agent_relay_stream::classify::{ContentClass, StreamEvent, classify};
use uuid::Uuid;

use crate::store::{TaskError, TaskStore};
use crate::task::Task;

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Owner name whose content counts as the work artifact.
    pub coordinator: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            coordinator: "coordinator".to_string(),
        }
    }
}

/// Task execution error. Caught at the scheduler's dispatch boundary,
/// which rolls the task back to pending.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Run(#[from] RunError),
    #[error(transparent)]
    Store(#[from] TaskError),
    #[error("run produced no work output")]
    EmptyRun,
}

/// Runs one claimed task to completion.
pub struct TaskExecutor {
    store: Arc<dyn TaskStore>,
    runner: Arc<dyn AgentRunner>,
    notifier: Option<Arc<dyn ClientSink>>,
    config: ExecutorConfig,
}

impl TaskExecutor {
    /// Create an executor over the given store and run collaborator.
    pub fn new(
        store: Arc<dyn TaskStore>,
        runner: Arc<dyn AgentRunner>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            store,
            runner,
            notifier: None,
            config,
        }
    }

    /// Mirror execution progress to a connected client.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn ClientSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Execute one already-claimed task.
    ///
    /// Saves the work artifact, then flips the task to completed. Any
    /// error leaves the task in-progress for the caller to roll back.
    ///
    /// # Errors
    /// Returns error if the run fails, produces no output, or the store
    /// rejects the finalization writes.
    pub async fn execute(&self, task: &Task) -> Result<(), ExecuteError> {
        tracing::info!(task_id = %task.id, "executing task");
        self.notify(task, TaskRunStatus::Processing, "Task picked up")
            .await;

        let result = self.run_to_artifact(task).await;
        match &result {
            Ok(_) => {
                self.notify(task, TaskRunStatus::Completed, "Task completed")
                    .await;
            }
            Err(e) => {
                self.notify(task, TaskRunStatus::Error, &format!("Task failed: {e}"))
                    .await;
            }
        }
        result
    }

    async fn run_to_artifact(&self, task: &Task) -> Result<(), ExecuteError> {
        let message = if task.description.is_empty() {
            task.text.clone()
        } else {
            format!("{}\n\n{}", task.text, task.description)
        };

        let mut run = self
            .runner
            .start(RunRequest {
                user_id: task.user_id.clone(),
                conversation_id: format!("task:{}", task.id),
                message_id: Uuid::new_v4().to_string(),
                message,
                media: TurnMedia::default(),
                config: HashMap::new(),
                session_state: serde_json::Value::Null,
            })
            .await?;

        let mut work = String::new();
        while let Some(chunk) = run.events.next().await {
            let chunk = chunk?;
            if let Some(StreamEvent::Content {
                text,
                class: ContentClass::Final,
                ..
            }) = classify(&chunk, &self.config.coordinator)
            {
                work.push_str(&text);
            }
        }

        if work.is_empty() {
            return Err(ExecuteError::EmptyRun);
        }
        self.store.save_work(&task.id, &work).await?;
        self.store.complete(&task.id).await?;
        Ok(())
    }

    async fn notify(&self, task: &Task, status: TaskRunStatus, message: &str) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let event = ClientEvent::TaskExecutionStatus {
            task_id: task.id.clone(),
            status,
            message: message.to_string(),
        };
        if let Err(e) = notifier.send(event).await {
            tracing::debug!(task_id = %task.id, error = %e, "status notification dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::stream;

    use agent_relay_core::{AgentRun, RunChunk, traits::SinkError};

    use super::*;
    use crate::store::memory::MemoryTaskStore;
    use crate::task::TaskStatus;

    struct ScriptedRunner {
        chunks: Mutex<Vec<Vec<Result<RunChunk, RunError>>>>,
    }

    impl ScriptedRunner {
        fn new(runs: Vec<Vec<Result<RunChunk, RunError>>>) -> Self {
            Self {
                chunks: Mutex::new(runs),
            }
        }
    }

    #[async_trait]
    impl AgentRunner for ScriptedRunner {
        async fn start(&self, _request: RunRequest) -> Result<AgentRun, RunError> {
            let mut runs = self.chunks.lock().unwrap();
            if runs.is_empty() {
                return Err(RunError::Failed("no scripted runs left".to_string()));
            }
            let chunks = runs.remove(0);
            Ok(AgentRun {
                events: stream::iter(chunks).boxed(),
            })
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        events: Mutex<Vec<ClientEvent>>,
    }

    #[async_trait]
    impl ClientSink for CollectingSink {
        async fn send(&self, event: ClientEvent) -> Result<(), SinkError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    async fn seeded_claimed_task(store: &MemoryTaskStore) -> Task {
        let task = Task::new("user-1", "summarize the news");
        store.create(task.clone()).await.unwrap();
        assert!(store.claim(&task.id).await.unwrap());
        store.get(&task.id).await.unwrap()
    }

    #[tokio::test]
    async fn successful_run_saves_work_then_completes() {
        let store = Arc::new(MemoryTaskStore::new());
        let task = seeded_claimed_task(&store).await;
        let runner = ScriptedRunner::new(vec![vec![
            Ok(RunChunk::content("researcher", "scanning feeds")),
            Ok(RunChunk::content("coordinator", "Today's summary.")),
        ]]);
        let executor = TaskExecutor::new(
            Arc::clone(&store) as Arc<dyn TaskStore>,
            Arc::new(runner),
            ExecutorConfig::default(),
        );

        executor.execute(&task).await.unwrap();

        let task = store.get(&task.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        // Delegated chatter never ends up in the artifact.
        assert_eq!(task.task_work.as_deref(), Some("Today's summary."));
    }

    #[tokio::test]
    async fn failed_run_leaves_task_in_progress_for_rollback() {
        let store = Arc::new(MemoryTaskStore::new());
        let task = seeded_claimed_task(&store).await;
        let runner = ScriptedRunner::new(vec![vec![Err(RunError::Failed(
            "model unavailable".to_string(),
        ))]]);
        let executor = TaskExecutor::new(
            Arc::clone(&store) as Arc<dyn TaskStore>,
            Arc::new(runner),
            ExecutorConfig::default(),
        );

        let err = executor.execute(&task).await.unwrap_err();
        assert!(matches!(err, ExecuteError::Run(_)));

        let task = store.get(&task.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.task_work.is_none());
    }

    #[tokio::test]
    async fn empty_run_is_an_error() {
        let store = Arc::new(MemoryTaskStore::new());
        let task = seeded_claimed_task(&store).await;
        let runner = ScriptedRunner::new(vec![vec![]]);
        let executor = TaskExecutor::new(
            Arc::clone(&store) as Arc<dyn TaskStore>,
            Arc::new(runner),
            ExecutorConfig::default(),
        );

        let err = executor.execute(&task).await.unwrap_err();
        assert!(matches!(err, ExecuteError::EmptyRun));
    }

    #[tokio::test]
    async fn progress_is_mirrored_to_the_notifier() {
        let store = Arc::new(MemoryTaskStore::new());
        let task = seeded_claimed_task(&store).await;
        let sink = Arc::new(CollectingSink::default());
        let runner = ScriptedRunner::new(vec![vec![Ok(RunChunk::content("coordinator", "done"))]]);
        let executor = TaskExecutor::new(
            Arc::clone(&store) as Arc<dyn TaskStore>,
            Arc::new(runner),
            ExecutorConfig::default(),
        )
        .with_notifier(Arc::clone(&sink) as Arc<dyn ClientSink>);

        executor.execute(&task).await.unwrap();

        let events = sink.events.lock().unwrap().clone();
        let statuses: Vec<TaskRunStatus> = events
            .iter()
            .filter_map(|e| match e {
                ClientEvent::TaskExecutionStatus { status, .. } => Some(*status),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![TaskRunStatus::Processing, TaskRunStatus::Completed]
        );
    }
}
