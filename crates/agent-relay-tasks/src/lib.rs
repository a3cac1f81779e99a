//! Background task scheduling and execution.
//!
//! Provides:
//! - `TaskStore` - Persisted task table with an atomic conditional claim
//! - `TaskScheduler` - Fixed-interval poll loop that claims pending tasks
//! - `TaskExecutor` - Drives one claimed task through an isolated agent run

pub mod executor;
pub mod scheduler;
pub mod store;
pub mod task;

pub use executor::{ExecuteError, ExecutorConfig, TaskExecutor};
pub use scheduler::{SchedulerConfig, TaskScheduler};
pub use store::{TaskError, TaskStore};
pub use task::{Task, TaskStatus};
