/// Task model and database operations
///
/// Tasks belong to exactly one user. The `security_code` column holds the
/// ciphertext produced by [`crate::crypto::encrypt`]; clients only ever see
/// the plaintext through [`TaskView`].
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('pending', 'in_progress', 'completed');
///
/// CREATE TABLE tasks (
///     id SERIAL PRIMARY KEY,
///     user_id INTEGER NOT NULL REFERENCES users(id),
///     title VARCHAR(255) NOT NULL,
///     description TEXT NOT NULL,
///     status task_status NOT NULL DEFAULT 'pending',
///     security_code TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskvault_shared::models::task::{Task, CreateTask, TaskStatus};
/// use taskvault_shared::crypto::encrypt;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let task = Task::create(&pool, CreateTask {
///     user_id: 1,
///     title: "Rotate keys".to_string(),
///     description: "Quarterly rotation".to_string(),
///     status: TaskStatus::Pending,
///     security_code: Some(encrypt("42", "encryption-key")?),
/// }).await?;
///
/// let view = task.reveal("encryption-key")?;
/// assert_eq!(view.security_code.as_deref(), Some("42"));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;

use crate::cache::Cacheable;
use crate::crypto::{self, CipherError};

/// Task progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task row as stored, with the security code still encrypted
///
/// This is also the cached snapshot, so ownership checks work on cache hits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: i32,

    /// Owning user
    pub user_id: i32,

    pub title: String,

    pub description: String,

    pub status: TaskStatus,

    /// `base64(iv || ciphertext)`
    pub security_code: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Task as returned to clients, with the security code decrypted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new task
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub user_id: i32,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,

    /// Already encrypted security code
    pub security_code: Option<String>,
}

/// Input for updating a task
///
/// None leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,

    /// Already encrypted security code
    pub security_code: Option<String>,
}

impl Cacheable for Task {
    const ENTITY: &'static str = "task";

    fn cache_id(&self) -> i32 {
        self.id
    }
}

const TASK_COLUMNS: &str =
    "id, user_id, title, description, status, security_code, created_at, updated_at";

impl Task {
    /// Decrypts the security code for output
    ///
    /// Empty or missing codes are passed through as-is.
    pub fn reveal(self, key: &str) -> Result<TaskView, CipherError> {
        let security_code = match self.security_code {
            Some(sealed) if !sealed.is_empty() => Some(crypto::decrypt(&sealed, key)?),
            other => other,
        };

        Ok(TaskView {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            status: self.status,
            security_code,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    /// Creates a new task
    ///
    /// # Errors
    ///
    /// Returns a foreign-key violation if `user_id` does not exist
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (user_id, title, description, status, security_code)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            TASK_COLUMNS
        ))
        .bind(data.user_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.status)
        .bind(data.security_code)
        .fetch_one(pool)
        .await?;

        Ok(task)
    }

    /// Finds a task by ID
    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE id = $1",
            TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    /// Returns only the owner of a task, for authorization before writes
    pub async fn find_owner(pool: &PgPool, id: i32) -> Result<Option<i32>, sqlx::Error> {
        let owner: Option<(i32,)> = sqlx::query_as("SELECT user_id FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(owner.map(|(user_id,)| user_id))
    }

    /// Lists every task (admin view)
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let tasks = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks ORDER BY id",
            TASK_COLUMNS
        ))
        .fetch_all(pool)
        .await?;

        Ok(tasks)
    }

    /// Lists the tasks owned by one user
    pub async fn list_by_owner(pool: &PgPool, user_id: i32) -> Result<Vec<Self>, sqlx::Error> {
        let tasks = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE user_id = $1 ORDER BY id",
            TASK_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(tasks)
    }

    /// Updates a task
    ///
    /// Fields that are None, or empty strings for the text columns, keep
    /// their stored value. `updated_at` is always refreshed.
    ///
    /// # Returns
    ///
    /// The updated task, None if it does not exist
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use taskvault_shared::models::task::{Task, TaskStatus, UpdateTask};
    /// # use sqlx::PgPool;
    /// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
    /// let update = UpdateTask {
    ///     status: Some(TaskStatus::Completed),
    ///     ..Default::default()
    /// };
    /// let task = Task::update(&pool, 7, update).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn update(
        pool: &PgPool,
        id: i32,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks
            SET title = COALESCE(NULLIF($2, ''), title),
                description = COALESCE(NULLIF($3, ''), description),
                status = COALESCE($4, status),
                security_code = COALESCE(NULLIF($5, ''), security_code),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TASK_COLUMNS
        ))
        .bind(id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.status)
        .bind(data.security_code)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    /// Deletes a task by ID
    ///
    /// # Returns
    ///
    /// True if the task was deleted, false if it didn't exist
    pub async fn delete(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "MySecretEncryptionKey!";

    fn sample(security_code: Option<String>) -> Task {
        Task {
            id: 3,
            user_id: 1,
            title: "T".to_string(),
            description: "D".to_string(),
            status: TaskStatus::Pending,
            security_code,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::from_str::<TaskStatus>("\"completed\"").unwrap(),
            TaskStatus::Completed
        );
        assert!(serde_json::from_str::<TaskStatus>("\"done\"").is_err());
        assert!(serde_json::from_str::<TaskStatus>("\"Pending\"").is_err());
    }

    #[test]
    fn test_reveal_decrypts() {
        let task = sample(Some(crypto::encrypt("42", KEY).unwrap()));

        let view = task.reveal(KEY).unwrap();
        assert_eq!(view.security_code.as_deref(), Some("42"));
        assert_eq!(view.user_id, 1);
    }

    #[test]
    fn test_reveal_passes_through_empty() {
        assert_eq!(sample(None).reveal(KEY).unwrap().security_code, None);
        assert_eq!(
            sample(Some(String::new())).reveal(KEY).unwrap().security_code,
            Some(String::new())
        );
    }

    #[test]
    fn test_reveal_rejects_short_ciphertext() {
        let task = sample(Some("c2hvcnQ=".to_string()));
        assert_eq!(task.reveal(KEY), Err(CipherError::InvalidCiphertext));
    }

    #[test]
    fn test_view_omits_missing_code() {
        let json = serde_json::to_value(sample(None).reveal(KEY).unwrap()).unwrap();
        assert!(json.get("security_code").is_none());
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn test_cached_snapshot_roundtrip() {
        let task = sample(Some(crypto::encrypt("42", KEY).unwrap()));
        let json = serde_json::to_string(&task).unwrap();

        assert_eq!(serde_json::from_str::<Task>(&json).unwrap(), task);
    }
}
