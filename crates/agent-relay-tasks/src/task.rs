//! The persisted task model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task lifecycle status.
///
/// The pending-to-in-progress transition is the sole concurrency-control
/// mechanism across scheduler instances; it must be an atomic conditional
/// update in every store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    /// Stable string form, as persisted.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the persisted string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// One persisted background task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Short task text.
    pub text: String,
    /// Longer free-form description.
    #[serde(default)]
    pub description: String,
    /// Priority label, e.g. `low`/`medium`/`high`.
    pub priority: String,
    pub status: TaskStatus,
    /// Optional deadline, ISO 8601.
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Work artifact produced by the executor.
    #[serde(default)]
    pub task_work: Option<String>,
}

impl Task {
    /// Create a pending task with a fresh id.
    #[must_use]
    pub fn new(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            text: text.into(),
            description: String::new(),
            priority: "medium".to_string(),
            status: TaskStatus::Pending,
            deadline: None,
            tags: Vec::new(),
            task_work: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the priority label.
    #[must_use]
    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = priority.into();
        self
    }

    /// Set the deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: impl Into<String>) -> Self {
        self.deadline = Some(deadline.into());
        self
    }

    /// Set the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_persisted_form() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Cancelled,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("paused"), None);
    }

    #[test]
    fn new_tasks_are_pending() {
        let task = Task::new("user-1", "water the plants").with_priority("high");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, "high");
        assert!(task.task_work.is_none());
    }

    #[test]
    fn wire_shape_is_camel_case() {
        let task = Task::new("user-1", "ship it");
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["status"], "pending");
        assert!(json.get("taskWork").is_some());
    }
}
