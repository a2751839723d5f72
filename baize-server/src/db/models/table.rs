//! Billiard Table Model

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Table lifecycle status
///
/// `Maintenance` is a reserved variant: it round-trips through storage
/// and JSON, but no transition in or out of it is defined yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    Idle,
    Occupied,
    Maintenance,
}

impl Default for TableStatus {
    fn default() -> Self {
        Self::Idle
    }
}

/// Billiard table entity
///
/// Invariant: `status == Occupied` if and only if `session_start` is set.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BilliardTable {
    pub id: i64,
    /// Venue-visible table number, unique
    pub number: i64,
    /// Rate charged per hour of play
    pub hourly_rate: f64,
    pub status: TableStatus,
    /// Session start time (epoch millis), set while occupied
    pub session_start: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One purchase recorded against an active session
///
/// `product_name` and `unit_price` are captured at purchase time so the
/// line stays valid if the product is later changed or removed.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConsumptionLine {
    pub id: i64,
    pub table_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub subtotal: f64,
    pub recorded_at: i64,
}

/// Table plus its live consumption ledger (detail views)
#[derive(Debug, Clone, Serialize)]
pub struct TableWithLedger {
    #[serde(flatten)]
    pub table: BilliardTable,
    pub consumption_lines: Vec<ConsumptionLine>,
}

/// Create table payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TableCreate {
    #[validate(range(min = 1, message = "table number must be positive"))]
    pub number: i64,
    #[validate(range(exclusive_min = 0.0, message = "hourly rate must be greater than zero"))]
    pub hourly_rate: f64,
}

/// Add consumption payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConsumptionAdd {
    pub product_id: i64,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

/// Close table payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableClose {
    #[serde(default)]
    pub payment_method: Option<super::PaymentMethod>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Actor identifier supplied by the caller; identity itself is
    /// managed outside this service
    #[serde(default)]
    pub closed_by: Option<String>,
}
