//! Transaction Repository
//!
//! Inserts are only performed by the archiver; every other operation is
//! a read. Listing supports the two required access paths (table number
//! and creation time, newest first) plus windowed aggregation for the
//! statistics endpoints.

use super::RepoResult;
use crate::db::models::{TransactionLine, TransactionRecord, TransactionWithLines};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

const RECORD_SELECT: &str = "SELECT id, table_number, table_id, session_start, session_end, \
     minutes_played, hourly_rate, time_cost, consumption_total, total_due, payment_method, \
     notes, closed_by, created_at FROM transaction_record";

const LINE_SELECT: &str = "SELECT id, transaction_id, product_id, product_name, quantity, \
     unit_price, subtotal, recorded_at FROM transaction_line";

/// Listing filter: table number and/or creation-time window
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub table_number: Option<i64>,
    pub from: Option<i64>,
    pub to: Option<i64>,
}

impl TransactionFilter {
    fn where_clause(&self) -> String {
        self.where_clause_prefixed("")
    }

    /// WHERE clause with a table alias prefix (joined queries)
    fn where_clause_prefixed(&self, prefix: &str) -> String {
        let mut sql = String::from(" WHERE 1 = 1");
        if self.table_number.is_some() {
            sql.push_str(&format!(" AND {prefix}table_number = ?"));
        }
        if self.from.is_some() {
            sql.push_str(&format!(" AND {prefix}created_at >= ?"));
        }
        if self.to.is_some() {
            sql.push_str(&format!(" AND {prefix}created_at <= ?"));
        }
        sql
    }
}

/// Bind the filter's present values in clause order
macro_rules! bind_filter {
    ($query:expr, $filter:expr) => {{
        let mut q = $query;
        if let Some(n) = $filter.table_number {
            q = q.bind(n);
        }
        if let Some(from) = $filter.from {
            q = q.bind(from);
        }
        if let Some(to) = $filter.to {
            q = q.bind(to);
        }
        q
    }};
}

/// Aggregate totals over a set of transactions
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransactionAggregate {
    pub total_sales: f64,
    pub total_transactions: i64,
    pub average_sale: f64,
    pub min_sale: f64,
    pub max_sale: f64,
    pub total_time_cost: f64,
    pub total_consumption: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TopProduct {
    pub product_name: String,
    pub quantity_sold: i64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TopTable {
    pub table_number: i64,
    pub revenue: f64,
    pub transactions: i64,
}

/// Revenue bucketed by UTC hour of session end; hours without data are
/// simply absent
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HourlyRevenue {
    pub hour: i64,
    pub revenue: f64,
    pub transactions: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentBreakdown {
    pub payment_method: crate::db::models::PaymentMethod,
    pub revenue: f64,
    pub transactions: i64,
}

/// Paginated listing, newest first, with lines attached
pub async fn list(
    pool: &SqlitePool,
    filter: &TransactionFilter,
    page: i64,
    page_size: i64,
) -> RepoResult<Vec<TransactionWithLines>> {
    let offset = (page - 1) * page_size;
    let sql = format!(
        "{RECORD_SELECT}{} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        filter.where_clause()
    );
    let records = bind_filter!(sqlx::query_as::<_, TransactionRecord>(&sql), filter)
        .bind(page_size)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let lines = lines_for(pool, record.id).await?;
        out.push(TransactionWithLines {
            record,
            consumption_lines: lines,
        });
    }
    Ok(out)
}

/// Count matching transactions (pagination metadata)
pub async fn count(pool: &SqlitePool, filter: &TransactionFilter) -> RepoResult<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM transaction_record{}",
        filter.where_clause()
    );
    let n = bind_filter!(sqlx::query_scalar::<_, i64>(&sql), filter)
        .fetch_one(pool)
        .await?;
    Ok(n)
}

/// Aggregate totals over the matching transactions
pub async fn aggregate(
    pool: &SqlitePool,
    filter: &TransactionFilter,
) -> RepoResult<TransactionAggregate> {
    let sql = format!(
        "SELECT COALESCE(SUM(total_due), 0.0) AS total_sales, \
                COUNT(*) AS total_transactions, \
                COALESCE(AVG(total_due), 0.0) AS average_sale, \
                COALESCE(MIN(total_due), 0.0) AS min_sale, \
                COALESCE(MAX(total_due), 0.0) AS max_sale, \
                COALESCE(SUM(time_cost), 0.0) AS total_time_cost, \
                COALESCE(SUM(consumption_total), 0.0) AS total_consumption \
         FROM transaction_record{}",
        filter.where_clause()
    );
    let agg = bind_filter!(sqlx::query_as::<_, TransactionAggregate>(&sql), filter)
        .fetch_one(pool)
        .await?;
    Ok(agg)
}

/// Top products by quantity sold, ties broken by revenue
pub async fn top_products(
    pool: &SqlitePool,
    filter: &TransactionFilter,
    limit: i64,
) -> RepoResult<Vec<TopProduct>> {
    let sql = format!(
        "SELECT l.product_name AS product_name, \
                SUM(l.quantity) AS quantity_sold, \
                COALESCE(SUM(l.subtotal), 0.0) AS revenue \
         FROM transaction_line l \
         JOIN transaction_record t ON t.id = l.transaction_id{} \
         GROUP BY l.product_name \
         ORDER BY quantity_sold DESC, revenue DESC \
         LIMIT ?",
        filter.where_clause_prefixed("t.")
    );
    let rows = bind_filter!(sqlx::query_as::<_, TopProduct>(&sql), filter)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Top tables by revenue
pub async fn top_tables(
    pool: &SqlitePool,
    filter: &TransactionFilter,
    limit: i64,
) -> RepoResult<Vec<TopTable>> {
    let sql = format!(
        "SELECT table_number, COALESCE(SUM(total_due), 0.0) AS revenue, \
                COUNT(*) AS transactions \
         FROM transaction_record{} \
         GROUP BY table_number \
         ORDER BY revenue DESC \
         LIMIT ?",
        filter.where_clause()
    );
    let rows = bind_filter!(sqlx::query_as::<_, TopTable>(&sql), filter)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Revenue grouped by the UTC hour of session end, ascending
pub async fn revenue_by_hour(
    pool: &SqlitePool,
    filter: &TransactionFilter,
) -> RepoResult<Vec<HourlyRevenue>> {
    let sql = format!(
        "SELECT CAST(strftime('%H', session_end / 1000, 'unixepoch') AS INTEGER) AS hour, \
                COALESCE(SUM(total_due), 0.0) AS revenue, \
                COUNT(*) AS transactions \
         FROM transaction_record{} \
         GROUP BY hour \
         ORDER BY hour",
        filter.where_clause()
    );
    let rows = bind_filter!(sqlx::query_as::<_, HourlyRevenue>(&sql), filter)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Revenue grouped by payment method
pub async fn revenue_by_payment_method(
    pool: &SqlitePool,
    filter: &TransactionFilter,
) -> RepoResult<Vec<PaymentBreakdown>> {
    let sql = format!(
        "SELECT payment_method, COALESCE(SUM(total_due), 0.0) AS revenue, \
                COUNT(*) AS transactions \
         FROM transaction_record{} \
         GROUP BY payment_method",
        filter.where_clause()
    );
    let rows = bind_filter!(sqlx::query_as::<_, PaymentBreakdown>(&sql), filter)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

async fn lines_for(pool: &SqlitePool, transaction_id: i64) -> RepoResult<Vec<TransactionLine>> {
    let sql = format!("{LINE_SELECT} WHERE transaction_id = ? ORDER BY recorded_at, id");
    let lines = sqlx::query_as::<_, TransactionLine>(&sql)
        .bind(transaction_id)
        .fetch_all(pool)
        .await?;
    Ok(lines)
}

// ========== Archive inserts (transactional, archiver only) ==========

/// Insert the immutable record row
pub async fn insert_record(
    conn: &mut SqliteConnection,
    record: &TransactionRecord,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO transaction_record (id, table_number, table_id, session_start, session_end, \
         minutes_played, hourly_rate, time_cost, consumption_total, total_due, payment_method, \
         notes, closed_by, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
    )
    .bind(record.id)
    .bind(record.table_number)
    .bind(record.table_id)
    .bind(record.session_start)
    .bind(record.session_end)
    .bind(record.minutes_played)
    .bind(record.hourly_rate)
    .bind(record.time_cost)
    .bind(record.consumption_total)
    .bind(record.total_due)
    .bind(record.payment_method)
    .bind(record.notes.as_str())
    .bind(record.closed_by.as_str())
    .bind(record.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Insert one archived line
pub async fn insert_line(conn: &mut SqliteConnection, line: &TransactionLine) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO transaction_line (id, transaction_id, product_id, product_name, quantity, \
         unit_price, subtotal, recorded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(line.id)
    .bind(line.transaction_id)
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

/// Idempotency probe: has this snapshot already been archived?
pub async fn exists(conn: &mut SqliteConnection, id: i64) -> RepoResult<bool> {
    let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transaction_record WHERE id = ?")
        .bind(id)
        .fetch_one(conn)
        .await?;
    Ok(n > 0)
}
