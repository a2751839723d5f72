//! Billiard Table Repository
//!
//! Pool-level reads plus the connection-level building blocks the
//! session manager composes into atomic open/close/consume units.

use super::{RepoError, RepoResult};
use crate::db::models::{BilliardTable, ConsumptionLine, TableCreate};
use crate::utils::{id::snowflake_id, time::now_millis};
use sqlx::{SqliteConnection, SqlitePool};

const TABLE_SELECT: &str = "SELECT id, number, hourly_rate, status, session_start, created_at, \
     updated_at FROM billiard_table";

const LINE_SELECT: &str = "SELECT id, table_id, product_id, product_name, quantity, unit_price, \
     subtotal, recorded_at FROM consumption_line";

/// All tables, ordered by venue number
pub async fn find_all(pool: &SqlitePool) -> RepoResult<Vec<BilliardTable>> {
    let sql = format!("{TABLE_SELECT} ORDER BY number");
    let tables = sqlx::query_as::<_, BilliardTable>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(tables)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<BilliardTable>> {
    let sql = format!("{TABLE_SELECT} WHERE id = ?");
    let table = sqlx::query_as::<_, BilliardTable>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(table)
}

pub async fn find_by_number(pool: &SqlitePool, number: i64) -> RepoResult<Option<BilliardTable>> {
    let sql = format!("{TABLE_SELECT} WHERE number = ?");
    let table = sqlx::query_as::<_, BilliardTable>(&sql)
        .bind(number)
        .fetch_optional(pool)
        .await?;
    Ok(table)
}

/// Re-read a table inside an open transaction
pub async fn find_by_id_conn(
    conn: &mut SqliteConnection,
    id: i64,
) -> RepoResult<Option<BilliardTable>> {
    let sql = format!("{TABLE_SELECT} WHERE id = ?");
    let table = sqlx::query_as::<_, BilliardTable>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(table)
}

/// Create a new table
pub async fn create(pool: &SqlitePool, data: TableCreate) -> RepoResult<BilliardTable> {
    if find_by_number(pool, data.number).await?.is_some() {
        return Err(RepoError::Duplicate(format!(
            "Table number {} already exists",
            data.number
        )));
    }

    let id = snowflake_id();
    let now = now_millis();
    sqlx::query(
        "INSERT INTO billiard_table (id, number, hourly_rate, status, session_start, created_at, updated_at) \
         VALUES (?1, ?2, ?3, 'IDLE', NULL, ?4, ?4)",
    )
    .bind(id)
    .bind(data.number)
    .bind(data.hourly_rate)
    .bind(now)
    .execute(pool)
    .await?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create table".into()))
}

/// Live ledger for a table, in recording order
pub async fn ledger(pool: &SqlitePool, table_id: i64) -> RepoResult<Vec<ConsumptionLine>> {
    let sql = format!("{LINE_SELECT} WHERE table_id = ? ORDER BY recorded_at, id");
    let lines = sqlx::query_as::<_, ConsumptionLine>(&sql)
        .bind(table_id)
        .fetch_all(pool)
        .await?;
    Ok(lines)
}

/// Ledger read inside an open transaction
pub async fn ledger_conn(
    conn: &mut SqliteConnection,
    table_id: i64,
) -> RepoResult<Vec<ConsumptionLine>> {
    let sql = format!("{LINE_SELECT} WHERE table_id = ? ORDER BY recorded_at, id");
    let lines = sqlx::query_as::<_, ConsumptionLine>(&sql)
        .bind(table_id)
        .fetch_all(conn)
        .await?;
    Ok(lines)
}

// ========== Transition building blocks (transactional) ==========

/// Idle -> Occupied. Returns affected row count; 0 means the table was
/// missing or not idle, which the caller disambiguates by re-reading.
pub async fn mark_occupied(
    conn: &mut SqliteConnection,
    id: i64,
    session_start: i64,
) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE billiard_table SET status = 'OCCUPIED', session_start = ?2, updated_at = ?2 \
         WHERE id = ?1 AND status = 'IDLE'",
    )
    .bind(id)
    .bind(session_start)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Occupied -> Idle. Returns affected row count; 0 means the table was
/// missing or not occupied.
pub async fn mark_idle(conn: &mut SqliteConnection, id: i64, now: i64) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE billiard_table SET status = 'IDLE', session_start = NULL, updated_at = ?2 \
         WHERE id = ?1 AND status = 'OCCUPIED'",
    )
    .bind(id)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Drop every live ledger row for a table (open and close transitions)
pub async fn clear_ledger(conn: &mut SqliteConnection, table_id: i64) -> RepoResult<()> {
    sqlx::query("DELETE FROM consumption_line WHERE table_id = ?")
        .bind(table_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Append one line to the live ledger
pub async fn insert_line(conn: &mut SqliteConnection, line: &ConsumptionLine) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO consumption_line (id, table_id, product_id, product_name, quantity, \
         unit_price, subtotal, recorded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(line.id)
    .bind(line.table_id)
    .bind(line.product_id)
    .bind(line.product_name.as_str())
    .bind(line.quantity)
    .bind(line.unit_price)
    .bind(line.subtotal)
    .bind(line.recorded_at)
    .execute(conn)
    .await?;
    Ok(())
}
