//! Transaction Archiving Service
//!
//! Writes the immutable transaction record for a closed session. One
//! attempt per call; retries, backoff and dead-lettering are owned by
//! the [`super::archive_worker`]. The insert is idempotent on the
//! snapshot's pre-assigned transaction ID so a retry after a partially
//! observed failure can never duplicate history.

use crate::db::models::{BilliardTable, ConsumptionLine, PaymentMethod, TransactionLine, TransactionRecord};
use crate::db::repository::transaction;
use crate::sessions::billing::Bill;
use crate::utils::{id::snowflake_id, time::now_millis};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Conversion error: {0}")]
    Conversion(String),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

impl From<sqlx::Error> for ArchiveError {
    fn from(err: sqlx::Error) -> Self {
        ArchiveError::Database(err.to_string())
    }
}

impl From<crate::db::repository::RepoError> for ArchiveError {
    fn from(err: crate::db::repository::RepoError) -> Self {
        ArchiveError::Database(err.to_string())
    }
}

/// Everything the archiver needs to persist one completed session.
///
/// Captured at close time (lines are a deep copy of the live ledger, so
/// later table activity cannot alter history) and serialized into the
/// pending-archive queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSnapshot {
    /// Pre-assigned ID of the transaction record to be written
    pub transaction_id: i64,
    pub table_id: i64,
    pub table_number: i64,
    pub session_start: i64,
    pub session_end: i64,
    pub minutes_played: i64,
    pub hourly_rate: f64,
    pub time_cost: f64,
    pub consumption_total: f64,
    pub total_due: f64,
    pub payment_method: PaymentMethod,
    pub notes: String,
    pub closed_by: String,
    pub lines: Vec<ConsumptionLine>,
}

impl ArchiveSnapshot {
    /// Build a snapshot from the closing table's state and its bill
    pub fn from_close(
        table: &BilliardTable,
        session_start: i64,
        session_end: i64,
        bill: &Bill,
        lines: Vec<ConsumptionLine>,
        payment_method: PaymentMethod,
        notes: String,
        closed_by: String,
    ) -> Self {
        Self {
            transaction_id: snowflake_id(),
            table_id: table.id,
            table_number: table.number,
            session_start,
            session_end,
            minutes_played: bill.minutes_played,
            hourly_rate: table.hourly_rate,
            time_cost: bill.time_cost,
            consumption_total: bill.consumption_total,
            total_due: bill.total_due,
            payment_method,
            notes,
            closed_by,
            lines,
        }
    }
}

/// Service for archiving closed sessions into the transaction tables
#[derive(Clone)]
pub struct TransactionArchiveService {
    pool: SqlitePool,
}

impl TransactionArchiveService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Archive one snapshot (single attempt).
    ///
    /// Record and lines are written in one transaction; a snapshot that
    /// was already archived is skipped.
    pub async fn archive(&self, snapshot: &ArchiveSnapshot) -> ArchiveResult<TransactionRecord> {
        let mut txn = self.pool.begin().await?;

        // Idempotency: skip if already archived
        if transaction::exists(&mut *txn, snapshot.transaction_id).await? {
            tracing::info!(
                transaction_id = snapshot.transaction_id,
                "Transaction already archived, skipping"
            );
            txn.rollback().await?;
            return Ok(self.record_from(snapshot));
        }

        let record = self.record_from(snapshot);
        transaction::insert_record(&mut *txn, &record).await?;

        for line in &snapshot.lines {
            let archived = TransactionLine {
                id: snowflake_id(),
                transaction_id: record.id,
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                subtotal: line.subtotal,
                recorded_at: line.recorded_at,
            };
            transaction::insert_line(&mut *txn, &archived).await?;
        }

        txn.commit().await?;

        tracing::info!(
            transaction_id = record.id,
            table_number = record.table_number,
            total_due = record.total_due,
            "Session archived"
        );
        Ok(record)
    }

    fn record_from(&self, snapshot: &ArchiveSnapshot) -> TransactionRecord {
        TransactionRecord {
            id: snapshot.transaction_id,
            table_number: snapshot.table_number,
            table_id: snapshot.table_id,
            session_start: snapshot.session_start,
            session_end: snapshot.session_end,
            minutes_played: snapshot.minutes_played,
            hourly_rate: snapshot.hourly_rate,
            time_cost: snapshot.time_cost,
            consumption_total: snapshot.consumption_total,
            total_due: snapshot.total_due,
            payment_method: snapshot.payment_method,
            notes: snapshot.notes.clone(),
            closed_by: snapshot.closed_by.clone(),
            created_at: now_millis(),
        }
    }
}
