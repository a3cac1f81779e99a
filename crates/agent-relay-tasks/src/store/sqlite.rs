//! SQLite task storage (feature-gated).

use async_trait::async_trait;
use sqlx::{Row, sqlite::SqlitePool};

use super::{TaskError, TaskStore};
use crate::task::{Task, TaskStatus};

fn sql_err(e: sqlx::Error) -> TaskError {
    TaskError::Unavailable(e.to_string())
}

/// SQLite-backed task store.
///
/// The claim transition is a single conditional `UPDATE` guarded by the
/// current status; `rows_affected` decides who won the race.
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    /// Open (and initialize) a task database.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or migrated.
    pub async fn connect(database_url: &str) -> Result<Self, TaskError> {
        let pool = SqlitePool::connect(database_url).await.map_err(sql_err)?;
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS tasks (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                text        TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                priority    TEXT NOT NULL DEFAULT 'medium',
                status      TEXT NOT NULL DEFAULT 'pending',
                deadline    TEXT,
                tags        TEXT NOT NULL DEFAULT '[]',
                task_work   TEXT
            )
            ",
        )
        .execute(&pool)
        .await
        .map_err(sql_err)?;
        Ok(Self { pool })
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Task, TaskError> {
        let status: String = row.get("status");
        let status = TaskStatus::parse(&status)
            .ok_or_else(|| TaskError::Corrupt(format!("unknown status '{status}'")))?;
        let tags: String = row.get("tags");
        let tags = serde_json::from_str(&tags).map_err(|e| TaskError::Corrupt(e.to_string()))?;

        Ok(Task {
            id: row.get("id"),
            user_id: row.get("user_id"),
            text: row.get("text"),
            description: row.get("description"),
            priority: row.get("priority"),
            status,
            deadline: row.get("deadline"),
            tags,
            task_work: row.get("task_work"),
        })
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn create(&self, task: Task) -> Result<(), TaskError> {
        let tags =
            serde_json::to_string(&task.tags).map_err(|e| TaskError::Corrupt(e.to_string()))?;
        sqlx::query(
            r"
            INSERT INTO tasks (id, user_id, text, description, priority, status, deadline, tags, task_work)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&task.id)
        .bind(&task.user_id)
        .bind(&task.text)
        .bind(&task.description)
        .bind(&task.priority)
        .bind(task.status.as_str())
        .bind(&task.deadline)
        .bind(&tags)
        .bind(&task.task_work)
        .execute(&self.pool)
        .await
        .map_err(sql_err)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Task, TaskError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sql_err)?
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        Self::from_row(&row)
    }

    async fn list_pending(&self) -> Result<Vec<Task>, TaskError> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE status = 'pending'")
            .fetch_all(&self.pool)
            .await
            .map_err(sql_err)?;
        rows.iter().map(Self::from_row).collect()
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Task>, TaskError> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(sql_err)?;
        rows.iter().map(Self::from_row).collect()
    }

    async fn claim(&self, id: &str) -> Result<bool, TaskError> {
        let result = sqlx::query("UPDATE tasks SET status = 'in_progress' WHERE id = ? AND status = 'pending'")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sql_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, id: &str) -> Result<(), TaskError> {
        sqlx::query("UPDATE tasks SET status = 'pending' WHERE id = ? AND status = 'in_progress'")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sql_err)?;
        Ok(())
    }

    async fn save_work(&self, id: &str, work: &str) -> Result<(), TaskError> {
        sqlx::query("UPDATE tasks SET task_work = ? WHERE id = ?")
            .bind(work)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sql_err)?;
        Ok(())
    }

    async fn complete(&self, id: &str) -> Result<(), TaskError> {
        sqlx::query("UPDATE tasks SET status = 'completed' WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sql_err)?;
        Ok(())
    }

    async fn cancel(&self, id: &str) -> Result<(), TaskError> {
        sqlx::query("UPDATE tasks SET status = 'cancelled' WHERE id = ? AND status != 'completed'")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sql_err)?;
        Ok(())
    }
}
