//! SQLite checkpoint storage
//!
//! [`SqliteCheckpointSaver`] persists each thread's log in a single table, so
//! interrupted threads can be resumed by a different process.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS checkpoints (
//!     thread_id     TEXT    NOT NULL,
//!     step          INTEGER NOT NULL,
//!     checkpoint_id TEXT    NOT NULL,
//!     status        TEXT    NOT NULL,
//!     created_at    TEXT    NOT NULL,
//!     data          BLOB    NOT NULL,
//!     PRIMARY KEY (thread_id, step)
//! );
//! ```
//!
//! `status` and `created_at` duplicate fields of the encoded checkpoint so the
//! log can be inspected with plain SQL. Appends take the database write lock
//! (`BEGIN IMMEDIATE`) before re-reading the thread head, so two processes
//! sharing the file cannot both write the same step; the loser gets
//! [`CheckpointError::Conflict`].

use crate::{
    checkpoint::Checkpoint,
    error::{CheckpointError, Result},
    serializer::{JsonSerializer, SerializerProtocol},
    traits::{CheckpointSaver, CheckpointStream},
};
use async_trait::async_trait;
use futures::stream;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS checkpoints (
    thread_id     TEXT    NOT NULL,
    step          INTEGER NOT NULL,
    checkpoint_id TEXT    NOT NULL,
    status        TEXT    NOT NULL,
    created_at    TEXT    NOT NULL,
    data          BLOB    NOT NULL,
    PRIMARY KEY (thread_id, step)
)
"#;

/// Durable checkpoint saver backed by SQLite
///
/// ```rust,no_run
/// use flowstate_checkpoint::SqliteCheckpointSaver;
///
/// # async fn example() -> flowstate_checkpoint::Result<()> {
/// // File-based database, created if missing
/// let saver = SqliteCheckpointSaver::connect("sqlite://checkpoints.db").await?;
///
/// // In-memory database (single connection, for tests)
/// let saver = SqliteCheckpointSaver::connect("sqlite::memory:").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SqliteCheckpointSaver<S = JsonSerializer> {
    pool: SqlitePool,
    serializer: S,
}

impl SqliteCheckpointSaver<JsonSerializer> {
    /// Open (or create) a database and ensure the schema exists
    pub async fn connect(database_url: &str) -> Result<Self> {
        Self::connect_with_serializer(database_url, JsonSerializer::new()).await
    }
}

impl<S: SerializerProtocol> SqliteCheckpointSaver<S> {
    pub async fn connect_with_serializer(database_url: &str, serializer: S) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // every connection to ":memory:" is a separate database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Self::from_pool(pool, serializer).await
    }

    /// Wrap an existing pool, creating the table if needed
    pub async fn from_pool(pool: SqlitePool, serializer: S) -> Result<Self> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        tracing::debug!("SQLite checkpoint schema ready");
        Ok(Self { pool, serializer })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn decode(&self, data: &[u8]) -> Result<Checkpoint> {
        self.serializer.loads(data)
    }
}

fn to_sql_step(step: u64) -> Result<i64> {
    i64::try_from(step).map_err(|_| CheckpointError::Invalid(format!("step {} out of range", step)))
}

/// Insert `checkpoint` if its step is above the thread head. Runs inside the
/// caller's write transaction.
async fn insert_after_head(conn: &mut SqliteConnection, checkpoint: &Checkpoint, step: i64, data: Vec<u8>) -> Result<()> {
    let head: Option<i64> = sqlx::query_scalar("SELECT MAX(step) FROM checkpoints WHERE thread_id = ?")
        .bind(&checkpoint.thread_id)
        .fetch_one(&mut *conn)
        .await?;

    let conflict = |latest: i64| CheckpointError::Conflict {
        thread_id: checkpoint.thread_id.clone(),
        step: checkpoint.step,
        latest: latest as u64,
    };

    if let Some(latest) = head {
        if step <= latest {
            return Err(conflict(latest));
        }
    }

    sqlx::query(
        "INSERT INTO checkpoints (thread_id, step, checkpoint_id, status, created_at, data)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&checkpoint.thread_id)
    .bind(step)
    .bind(&checkpoint.id)
    .bind(checkpoint.status.as_str())
    .bind(checkpoint.ts.to_rfc3339())
    .bind(data)
    .execute(&mut *conn)
    .await
    .map_err(|err| match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => conflict(head.unwrap_or(step)),
        _ => CheckpointError::from(err),
    })?;

    Ok(())
}

#[async_trait]
impl<S> CheckpointSaver for SqliteCheckpointSaver<S>
where
    S: SerializerProtocol + 'static,
{
    async fn append(&self, checkpoint: Checkpoint) -> Result<()> {
        let data = self.serializer.dumps(&checkpoint)?;
        let step = to_sql_step(checkpoint.step)?;

        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        match insert_after_head(&mut conn, &checkpoint, step, data).await {
            Ok(()) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
            }
            Err(err) => {
                if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    tracing::warn!(error = %rollback, "Rollback of rejected append failed");
                }
                return Err(err);
            }
        }

        tracing::trace!(thread_id = %checkpoint.thread_id, step = checkpoint.step, "Checkpoint committed");
        Ok(())
    }

    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let row: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT data FROM checkpoints WHERE thread_id = ? ORDER BY step DESC LIMIT 1")
                .bind(thread_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|data| self.decode(&data)).transpose()
    }

    async fn get(&self, thread_id: &str, step: u64) -> Result<Checkpoint> {
        let row: Option<Vec<u8>> = sqlx::query_scalar("SELECT data FROM checkpoints WHERE thread_id = ? AND step = ?")
            .bind(thread_id)
            .bind(to_sql_step(step)?)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(data) => self.decode(&data),
            None => Err(CheckpointError::NotFound {
                thread_id: thread_id.to_string(),
                step,
            }),
        }
    }

    async fn list(
        &self,
        thread_id: &str,
        before: Option<u64>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream> {
        let before = match before {
            Some(step) => to_sql_step(step)?,
            None => i64::MAX,
        };
        // SQLite treats a negative LIMIT as "no limit"
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let rows: Vec<Vec<u8>> = sqlx::query_scalar(
            "SELECT data FROM checkpoints WHERE thread_id = ? AND step < ? ORDER BY step DESC LIMIT ?",
        )
        .bind(thread_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let results: Vec<Result<Checkpoint>> = rows.iter().map(|data| self.decode(data)).collect();
        Ok(Box::pin(stream::iter(results)))
    }

    async fn threads(&self) -> Result<Vec<String>> {
        let threads: Vec<String> = sqlx::query_scalar("SELECT DISTINCT thread_id FROM checkpoints ORDER BY thread_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(threads)
    }
}
