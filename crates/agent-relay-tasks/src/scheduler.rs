//! The polling scheduler.
//!
//! Wakes on a fixed interval, scans for pending tasks, and claims each
//! one with the store's atomic conditional transition before handing it
//! to the executor on its own tokio task. The persisted claim, not the
//! in-process guard set, is the mutual-exclusion mechanism across
//! scheduler instances; the guard only avoids double-submission within
//! one process.

use std::{collections::HashSet, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::executor::TaskExecutor;
use crate::store::TaskStore;
use crate::task::Task;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between pending-task scans.
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
        }
    }
}

/// Claims pending tasks and dispatches them to the executor.
pub struct TaskScheduler {
    store: Arc<dyn TaskStore>,
    executor: Arc<TaskExecutor>,
    config: SchedulerConfig,
    in_flight: Mutex<HashSet<String>>,
}

impl TaskScheduler {
    /// Create a scheduler over the given store and executor.
    pub fn new(
        store: Arc<dyn TaskStore>,
        executor: Arc<TaskExecutor>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            executor,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Start the poll loop on its own task.
    ///
    /// The loop survives every individual task failure and stops only
    /// when `shutdown` is cancelled.
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(interval = ?self.config.poll_interval, "task scheduler started");

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        tracing::info!("task scheduler stopping");
                        break;
                    }
                    _ = ticker.tick() => Self::cycle(&self).await,
                }
            }
        })
    }

    async fn cycle(scheduler: &Arc<Self>) {
        let pending = match scheduler.store.list_pending().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(error = %e, "pending scan failed");
                return;
            }
        };

        for task in pending {
            if !scheduler.in_flight.lock().await.insert(task.id.clone()) {
                continue;
            }
            match scheduler.store.claim(&task.id).await {
                Ok(true) => {
                    let scheduler = Arc::clone(scheduler);
                    tokio::spawn(async move { scheduler.dispatch(task).await });
                }
                Ok(false) => {
                    // Another instance won the claim.
                    scheduler.in_flight.lock().await.remove(&task.id);
                }
                Err(e) => {
                    tracing::error!(task_id = %task.id, error = %e, "claim failed");
                    scheduler.in_flight.lock().await.remove(&task.id);
                }
            }
        }
    }

    /// Dispatch boundary: every executor error is resolved here by
    /// rolling the task back to pending, so it becomes eligible again on
    /// a future cycle.
    async fn dispatch(&self, task: Task) {
        if let Err(e) = self.executor.execute(&task).await {
            tracing::error!(task_id = %task.id, error = %e, "task failed, rolling back");
            if let Err(e) = self.store.release(&task.id).await {
                tracing::error!(task_id = %task.id, error = %e, "rollback failed");
            }
        }
        self.in_flight.lock().await.remove(&task.id);
    }
}
