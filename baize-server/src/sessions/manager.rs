//! SessionManager - table lifecycle and consumption engine
//!
//! Owns the three mutating operations on a table (`open`, `close`,
//! `add_consumption`) plus the ledger read. Guarantees:
//!
//! - Per-table serialization: operations on the same table run under a
//!   per-table async mutex; different tables proceed independently.
//! - Atomic units: every mutating operation is one SQLite transaction.
//!   A failure or deadline expiry drops the transaction, so no partial
//!   state (half-applied transition, decrement without ledger line) is
//!   ever observable.
//! - Best-effort archival: closing enqueues the session snapshot in the
//!   same transaction that frees the table, then nudges the archive
//!   worker. Archive problems never reach the close caller.
//!
//! # Command flow (close)
//!
//! ```text
//! close_table(id)
//!     ├─ 1. Acquire per-table lock (deadline applies)
//!     ├─ 2. Begin transaction
//!     ├─ 3. Load table, require Occupied
//!     ├─ 4. Compute bill from ledger (pure)
//!     ├─ 5. Enqueue archive snapshot
//!     ├─ 6. Transition to Idle, clear ledger
//!     ├─ 7. Commit
//!     ├─ 8. Nudge archive worker (non-blocking)
//!     └─ 9. Return (table, bill)
//! ```

use crate::db::DbService;
use crate::db::models::{
    ConsumptionAdd, ConsumptionLine, TableClose, TableStatus, TableWithLedger,
};
use crate::db::repository::{RepoError, archive_queue, product, table};
use crate::sessions::archive::ArchiveSnapshot;
use crate::sessions::billing::{self, Bill};
use crate::sessions::error::{SessionError, SessionResult};
use crate::utils::{id::snowflake_id, time::now_millis};
use dashmap::DashMap;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

/// Capacity of the archive nudge channel. The worker also scans the
/// durable queue periodically, so a full channel only delays pickup.
const ARCHIVE_NUDGE_CAPACITY: usize = 256;

/// Session engine over the shared SQLite pools
pub struct SessionManager {
    /// Read pool for post-commit views and ledger listings
    read_pool: SqlitePool,
    /// Write pool (single connection) for the atomic operation units
    write_pool: SqlitePool,
    /// Per-table locks, created on first use
    locks: DashMap<i64, Arc<Mutex<()>>>,
    /// Deadline for a single operation, including lock wait
    op_timeout: Duration,
    archive_tx: mpsc::Sender<()>,
}

impl SessionManager {
    /// Create the manager and the receiving end of the archive nudge
    /// channel (handed to the archive worker at startup)
    pub fn new(db: &DbService, op_timeout: Duration) -> (Self, mpsc::Receiver<()>) {
        let (archive_tx, archive_rx) = mpsc::channel(ARCHIVE_NUDGE_CAPACITY);
        (
            Self {
                read_pool: db.pool.clone(),
                write_pool: db.write_pool.clone(),
                locks: DashMap::new(),
                op_timeout,
                archive_tx,
            },
            archive_rx,
        )
    }

    fn table_lock(&self, table_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .entry(table_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn with_deadline<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = SessionResult<T>>,
    ) -> SessionResult<T> {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| SessionError::Timeout(op))?
    }

    /// Open a table: Idle -> Occupied with a fresh, empty ledger
    pub async fn open_table(&self, table_id: i64) -> SessionResult<TableWithLedger> {
        self.with_deadline("open_table", self.open_table_inner(table_id))
            .await
    }

    async fn open_table_inner(&self, table_id: i64) -> SessionResult<TableWithLedger> {
        let lock = self.table_lock(table_id);
        let _guard = lock.lock().await;

        let mut txn = self.write_pool.begin().await.map_err(RepoError::from)?;
        let now = now_millis();

        let rows = table::mark_occupied(&mut *txn, table_id, now).await?;
        if rows == 0 {
            return Err(self.state_error(&mut *txn, table_id, "open").await);
        }
        // A previous session must never leak into this one
        table::clear_ledger(&mut *txn, table_id).await?;

        txn.commit().await.map_err(RepoError::from)?;
        tracing::info!(table_id, "Table opened");

        self.table_view(table_id).await
    }

    /// Record a purchase against an occupied table.
    ///
    /// The ledger append and the stock decrement commit together or not
    /// at all; a conditional decrement prevents overselling under
    /// concurrent requests for the same product.
    pub async fn add_consumption(
        &self,
        table_id: i64,
        req: ConsumptionAdd,
    ) -> SessionResult<(TableWithLedger, String)> {
        self.with_deadline("add_consumption", self.add_consumption_inner(table_id, req))
            .await
    }

    async fn add_consumption_inner(
        &self,
        table_id: i64,
        req: ConsumptionAdd,
    ) -> SessionResult<(TableWithLedger, String)> {
        let lock = self.table_lock(table_id);
        let _guard = lock.lock().await;

        let mut txn = self.write_pool.begin().await.map_err(RepoError::from)?;

        let Some(tbl) = table::find_by_id_conn(&mut *txn, table_id).await? else {
            return Err(SessionError::NotFound(format!(
                "Table {table_id} not found"
            )));
        };
        if tbl.status != TableStatus::Occupied {
            return Err(SessionError::InvalidState(
                "Table must be occupied to add consumptions".into(),
            ));
        }

        let Some(prod) = product::find_by_id_conn(&mut *txn, req.product_id).await? else {
            return Err(SessionError::NotFound(format!(
                "Product {} not found",
                req.product_id
            )));
        };
        if !prod.is_active {
            return Err(SessionError::ProductUnavailable(prod.name));
        }

        if req.quantity < 1 {
            return Err(SessionError::Validation(
                "quantity must be at least 1".into(),
            ));
        }
        let rows = product::decrement_stock(&mut *txn, prod.id, req.quantity).await?;
        if rows == 0 {
            return Err(SessionError::InsufficientStock {
                available: prod.stock,
            });
        }

        let line = ConsumptionLine {
            id: snowflake_id(),
            table_id,
            product_id: prod.id,
            product_name: prod.name.clone(),
            quantity: req.quantity,
            unit_price: prod.price,
            subtotal: billing::line_subtotal(prod.price, req.quantity),
            recorded_at: now_millis(),
        };
        table::insert_line(&mut *txn, &line).await?;

        txn.commit().await.map_err(RepoError::from)?;

        let message = format!(
            "{}x {} added to table #{}",
            req.quantity, prod.name, tbl.number
        );
        tracing::info!(
            table_id,
            product_id = prod.id,
            quantity = req.quantity,
            "Consumption recorded"
        );

        Ok((self.table_view(table_id).await?, message))
    }

    /// Close a table: Occupied -> Idle, returning the computed bill.
    ///
    /// The archive snapshot is queued durably inside the same
    /// transaction; actual archival happens off this path and its
    /// outcome does not affect the returned result.
    pub async fn close_table(
        &self,
        table_id: i64,
        req: TableClose,
    ) -> SessionResult<(TableWithLedger, Bill)> {
        self.with_deadline("close_table", self.close_table_inner(table_id, req))
            .await
    }

    async fn close_table_inner(
        &self,
        table_id: i64,
        req: TableClose,
    ) -> SessionResult<(TableWithLedger, Bill)> {
        let lock = self.table_lock(table_id);
        let _guard = lock.lock().await;

        let mut txn = self.write_pool.begin().await.map_err(RepoError::from)?;

        let Some(tbl) = table::find_by_id_conn(&mut *txn, table_id).await? else {
            return Err(SessionError::NotFound(format!(
                "Table {table_id} not found"
            )));
        };
        let Some(session_start) = tbl.session_start.filter(|_| tbl.status == TableStatus::Occupied)
        else {
            return Err(SessionError::InvalidState(format!(
                "Cannot close table {}: status is {:?}",
                tbl.number, tbl.status
            )));
        };

        let session_end = now_millis();
        let lines = table::ledger_conn(&mut *txn, table_id).await?;
        let bill = billing::compute_bill(session_start, session_end, tbl.hourly_rate, &lines);

        let snapshot = ArchiveSnapshot::from_close(
            &tbl,
            session_start,
            session_end,
            &bill,
            lines,
            req.payment_method.unwrap_or_default(),
            req.notes.unwrap_or_default(),
            req.closed_by.unwrap_or_else(|| "system".to_string()),
        );
        let payload = serde_json::to_string(&snapshot)
            .map_err(|e| RepoError::Database(format!("Failed to serialize snapshot: {e}")))?;
        archive_queue::enqueue(&mut *txn, snapshot.transaction_id, &payload, session_end).await?;

        let rows = table::mark_idle(&mut *txn, table_id, session_end).await?;
        if rows == 0 {
            // The per-table lock makes this unreachable; fail loudly
            return Err(SessionError::InvalidState(format!(
                "Table {} changed state during close",
                tbl.number
            )));
        }
        table::clear_ledger(&mut *txn, table_id).await?;

        txn.commit().await.map_err(RepoError::from)?;

        // Wake the archive worker; the durable queue covers a full or
        // closed channel, the periodic scan will pick the entry up
        if let Err(e) = self.archive_tx.try_send(()) {
            tracing::warn!(error = %e, "Archive nudge not delivered, queue scan will catch up");
        }

        tracing::info!(
            table_id,
            table_number = tbl.number,
            minutes_played = bill.minutes_played,
            total_due = bill.total_due,
            "Table closed"
        );

        Ok((self.table_view(table_id).await?, bill))
    }

    /// Current ledger of a table (read-only, no lock)
    pub async fn list_consumptions(&self, table_id: i64) -> SessionResult<Vec<ConsumptionLine>> {
        if table::find_by_id(&self.read_pool, table_id).await?.is_none() {
            return Err(SessionError::NotFound(format!(
                "Table {table_id} not found"
            )));
        }
        Ok(table::ledger(&self.read_pool, table_id).await?)
    }

    /// Table plus ledger, fetched outside any transaction
    pub async fn table_view(&self, table_id: i64) -> SessionResult<TableWithLedger> {
        let tbl = table::find_by_id(&self.read_pool, table_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("Table {table_id} not found")))?;
        let lines = table::ledger(&self.read_pool, table_id).await?;
        Ok(TableWithLedger {
            table: tbl,
            consumption_lines: lines,
        })
    }

    /// Disambiguate a failed conditional transition: missing table vs
    /// wrong state
    async fn state_error(
        &self,
        conn: &mut sqlx::SqliteConnection,
        table_id: i64,
        op: &str,
    ) -> SessionError {
        match table::find_by_id_conn(conn, table_id).await {
            Ok(None) => SessionError::NotFound(format!("Table {table_id} not found")),
            // Maintenance is a reserved status with no defined transitions
            Ok(Some(tbl)) if tbl.status == TableStatus::Maintenance => {
                SessionError::InvalidState(format!(
                    "Table {} is under maintenance, sessions are not supported",
                    tbl.number
                ))
            }
            Ok(Some(tbl)) => SessionError::InvalidState(format!(
                "Cannot {op} table {}: status is {:?}",
                tbl.number, tbl.status
            )),
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests;
