//! Pending-Archive Queue Repository
//!
//! The close transition enqueues a session snapshot here in the same
//! transaction that frees the table; the archive worker drains it.
//! Entries that exhaust their retries are flagged `failed` (dead
//! letter) and recovered at the next startup.

use super::RepoResult;
use sqlx::{SqliteConnection, SqlitePool};

/// One queued snapshot awaiting archival
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingArchive {
    pub id: i64,
    /// JSON-serialized session snapshot
    pub payload: String,
    pub retry_count: i64,
    pub last_error: Option<String>,
    pub created_at: i64,
}

/// Enqueue a snapshot inside the closing transaction
pub async fn enqueue(
    conn: &mut SqliteConnection,
    id: i64,
    payload: &str,
    now: i64,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO archive_queue (id, payload, retry_count, last_error, failed, created_at) \
         VALUES (?1, ?2, 0, NULL, 0, ?3)",
    )
    .bind(id)
    .bind(payload)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

/// All entries still eligible for archiving, oldest first
pub async fn pending(pool: &SqlitePool) -> RepoResult<Vec<PendingArchive>> {
    let entries = sqlx::query_as::<_, PendingArchive>(
        "SELECT id, payload, retry_count, last_error, created_at \
         FROM archive_queue WHERE failed = 0 ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(entries)
}

/// Remove an entry after successful archival
pub async fn complete(pool: &SqlitePool, id: i64) -> RepoResult<()> {
    sqlx::query("DELETE FROM archive_queue WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Record a failed attempt (bumps the retry counter)
pub async fn record_failure(pool: &SqlitePool, id: i64, error: &str) -> RepoResult<()> {
    sqlx::query(
        "UPDATE archive_queue SET retry_count = retry_count + 1, last_error = ? WHERE id = ?",
    )
    .bind(error)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Dead-letter an entry that exhausted its retries
pub async fn mark_failed(pool: &SqlitePool, id: i64, error: &str) -> RepoResult<()> {
    sqlx::query("UPDATE archive_queue SET failed = 1, last_error = ? WHERE id = ?")
        .bind(error)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Move dead letters back to the pending queue (startup recovery).
/// Returns the number of recovered entries.
pub async fn recover_failed(pool: &SqlitePool) -> RepoResult<u64> {
    let result =
        sqlx::query("UPDATE archive_queue SET failed = 0, retry_count = 0 WHERE failed = 1")
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}
