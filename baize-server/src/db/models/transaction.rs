//! Archived Transaction Model
//!
//! A transaction is the immutable snapshot of one completed session.
//! Records are write-once: nothing in this crate updates or deletes
//! them after the archiver has inserted them.

use serde::{Deserialize, Serialize};

/// Payment method recorded at close time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Other,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        Self::Cash
    }
}

/// Archived session record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransactionRecord {
    pub id: i64,
    pub table_number: i64,
    pub table_id: i64,
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
    /// Archival timestamp, immutable once written
    pub created_at: i64,
}

/// Line copied from the session ledger into the archive
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransactionLine {
    pub id: i64,
    pub transaction_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub subtotal: f64,
    pub recorded_at: i64,
}

/// Transaction plus its archived consumption lines (list/detail views)
#[derive(Debug, Clone, Serialize)]
pub struct TransactionWithLines {
    #[serde(flatten)]
    pub record: TransactionRecord,
    pub consumption_lines: Vec<TransactionLine>,
}
