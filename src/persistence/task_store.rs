//! Durable task store backed by a process-local sqlite file
//!
//! Pure persistence boundary: CRUD only, no business validation beyond id
//! uniqueness and terminal-record immutability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::debug;

use crate::domain::{ResourceLock, Task, TaskStatus};
use crate::error::{LaminarError, Result};

/// Async CRUD contract for the task record store
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Tasks whose `started_at` falls in `[begin, end]` (`end` unbounded when
    /// `None`), ordered by `started_at`
    async fn get_all_tasks(
        &self,
        begin: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Task>>;

    /// Tasks in a non-terminal status
    async fn get_active_tasks(&self) -> Result<Vec<Task>>;

    async fn get_task(&self, id: &str) -> Result<Option<Task>>;

    /// Insert a new record; fails if the id already exists
    async fn add_task(&self, task: &Task) -> Result<()>;

    /// Replace the stored record; fails if the id does not exist or the
    /// stored record is already terminal
    async fn update_task(&self, task: &Task) -> Result<()>;
}

pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    /// Open (creating if missing) the sqlite database at `database_url`,
    /// e.g. `sqlite://laminar.db` or `sqlite::memory:`
    pub async fn open(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                definition_name TEXT NOT NULL,
                status TEXT NOT NULL,
                resources_taken TEXT NOT NULL DEFAULT '[]',
                started_at TEXT NOT NULL,
                last_updated_at TEXT NOT NULL,
                finished_at TEXT,
                status_message TEXT NOT NULL DEFAULT '',
                task_data TEXT NOT NULL DEFAULT '{"kind":"empty"}'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_started_at ON tasks(started_at)")
            .execute(&self.pool)
            .await?;

        debug!("Task store schema ready");
        Ok(())
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Result<Task> {
        let status_raw: String = row.get("status");
        let status = TaskStatus::from_str(&status_raw)
            .map_err(|e| LaminarError::Internal(format!("corrupt status column: {}", e)))?;

        let resources_raw: String = row.get("resources_taken");
        let resources: Vec<ResourceLock> = serde_json::from_str(&resources_raw)?;

        let data_raw: String = row.get("task_data");
        let task_data = serde_json::from_str(&data_raw)?;

        Ok(Task {
            id: row.get("id"),
            definition_name: row.get("definition_name"),
            status,
            resources_taken: resources,
            started_at: row.get("started_at"),
            last_updated_at: row.get("last_updated_at"),
            finished_at: row.get("finished_at"),
            status_message: row.get("status_message"),
            task_data,
        })
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn get_all_tasks(
        &self,
        begin: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Task>> {
        let rows = match end {
            Some(end) => {
                sqlx::query(
                    "SELECT * FROM tasks WHERE started_at >= ? AND started_at <= ? \
                     ORDER BY started_at, id",
                )
                .bind(begin)
                .bind(end)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM tasks WHERE started_at >= ? ORDER BY started_at, id")
                    .bind(begin)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(Self::row_to_task).collect()
    }

    async fn get_active_tasks(&self) -> Result<Vec<Task>> {
        let rows = sqlx::query(
            "SELECT * FROM tasks WHERE status IN ('pre-start', 'running') \
             ORDER BY started_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_task).collect()
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    async fn add_task(&self, task: &Task) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO tasks (
                id, definition_name, status, resources_taken,
                started_at, last_updated_at, finished_at, status_message, task_data
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.id)
        .bind(&task.definition_name)
        .bind(task.status.as_str())
        .bind(serde_json::to_string(&task.resources_taken)?)
        .bind(task.started_at)
        .bind(task.last_updated_at)
        .bind(task.finished_at)
        .bind(&task.status_message)
        .bind(serde_json::to_string(&task.task_data)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LaminarError::DuplicateTask(task.id.clone()));
        }
        debug!("Task {} added ({})", task.id, task.definition_name);
        Ok(())
    }

    async fn update_task(&self, task: &Task) -> Result<()> {
        // Terminal records are immutable audit history
        let existing = self
            .get_task(&task.id)
            .await?
            .ok_or_else(|| LaminarError::TaskNotFound(task.id.clone()))?;
        if existing.is_terminal() {
            return Err(LaminarError::TaskFinished(task.id.clone()));
        }

        sqlx::query(
            r#"
            UPDATE tasks SET
                definition_name = ?, status = ?, resources_taken = ?,
                started_at = ?, last_updated_at = ?, finished_at = ?,
                status_message = ?, task_data = ?
            WHERE id = ?
            "#,
        )
        .bind(&task.definition_name)
        .bind(task.status.as_str())
        .bind(serde_json::to_string(&task.resources_taken)?)
        .bind(task.started_at)
        .bind(task.last_updated_at)
        .bind(task.finished_at)
        .bind(&task.status_message)
        .bind(serde_json::to_string(&task.task_data)?)
        .bind(&task.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
