//! Database Models
//!
//! Row types derive `sqlx::FromRow`; status enums are stored as
//! SCREAMING_SNAKE_CASE TEXT. Timestamps are UTC epoch milliseconds.

pub mod product;
pub mod table;
pub mod transaction;

pub use product::{Product, ProductCategory, ProductCreate, ProductUpdate};
pub use table::{
    BilliardTable, ConsumptionAdd, ConsumptionLine, TableClose, TableCreate, TableStatus,
    TableWithLedger,
};
pub use transaction::{PaymentMethod, TransactionLine, TransactionRecord, TransactionWithLines};
