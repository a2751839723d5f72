//! Archive Worker - drains the pending-archive queue
//!
//! Listens for nudges from the session manager and additionally scans
//! the durable queue on an interval, so archives survive missed nudges
//! and process restarts. Failures back off exponentially and dead-letter
//! after the retry limit; dead letters are re-queued at startup.

use crate::db::repository::archive_queue::{self, PendingArchive};
use crate::sessions::archive::{ArchiveSnapshot, TransactionArchiveService};
use crate::utils::time::now_millis;
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::sync::mpsc;

/// Archive worker configuration
const MAX_RETRY_COUNT: i64 = 3;
const RETRY_BASE_DELAY_SECS: u64 = 5;
const RETRY_MAX_DELAY_SECS: u64 = 60;
const QUEUE_SCAN_INTERVAL_SECS: u64 = 60;
/// Bound on a single archive attempt so a stuck write cannot wedge the
/// queue
const ARCHIVE_ATTEMPT_TIMEOUT_SECS: u64 = 10;

/// Worker that turns queued session snapshots into transaction records
pub struct ArchiveWorker {
    pool: SqlitePool,
    archive_service: TransactionArchiveService,
}

impl ArchiveWorker {
    pub fn new(pool: SqlitePool) -> Self {
        let archive_service = TransactionArchiveService::new(pool.clone());
        Self {
            pool,
            archive_service,
        }
    }

    /// Run the worker until the nudge channel closes
    pub async fn run(self, mut nudge_rx: mpsc::Receiver<()>) {
        tracing::info!("ArchiveWorker started");

        // Recover dead letters (previously failed archives) back to the
        // pending queue
        match archive_queue::recover_failed(&self.pool).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "Recovered dead letter entries to pending queue"),
            Err(e) => tracing::error!(error = %e, "Failed to recover dead letter entries"),
        }

        // Process anything left over from a previous run
        self.process_pending_queue().await;

        let mut scan_interval = tokio::time::interval(Duration::from_secs(QUEUE_SCAN_INTERVAL_SECS));

        loop {
            tokio::select! {
                nudge = nudge_rx.recv() => {
                    match nudge {
                        Some(()) => self.process_pending_queue().await,
                        None => {
                            tracing::info!("Archive channel closed, shutting down ArchiveWorker");
                            break;
                        }
                    }
                }
                _ = scan_interval.tick() => {
                    self.process_pending_queue().await;
                }
            }
        }
    }

    /// Process all pending archives whose backoff has elapsed
    pub async fn process_pending_queue(&self) {
        let pending = match archive_queue::pending(&self.pool).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read pending archive queue");
                return;
            }
        };

        if pending.is_empty() {
            return;
        }

        tracing::debug!(count = pending.len(), "Processing pending archive queue");

        let now = now_millis();
        for entry in pending {
            if entry.retry_count >= MAX_RETRY_COUNT {
                tracing::error!(
                    entry_id = entry.id,
                    retry_count = entry.retry_count,
                    last_error = ?entry.last_error,
                    "Max retry count exceeded, moving to dead letter queue"
                );
                let error = entry.last_error.as_deref().unwrap_or("Unknown error");
                if let Err(e) = archive_queue::mark_failed(&self.pool, entry.id, error).await {
                    tracing::error!(entry_id = entry.id, error = %e, "Failed to dead-letter entry");
                }
                continue;
            }
            if !backoff_elapsed(&entry, now) {
                continue;
            }
            self.process_entry(entry).await;
        }
    }

    /// Archive one queue entry
    async fn process_entry(&self, entry: PendingArchive) {
        let snapshot: ArchiveSnapshot = match serde_json::from_str(&entry.payload) {
            Ok(s) => s,
            Err(e) => {
                // Unparseable payloads can never succeed; dead-letter now
                let err = crate::sessions::archive::ArchiveError::Conversion(e.to_string());
                tracing::error!(entry_id = entry.id, error = %err, "Corrupt archive payload");
                let _ = archive_queue::mark_failed(&self.pool, entry.id, &err.to_string()).await;
                return;
            }
        };

        let attempt = tokio::time::timeout(
            Duration::from_secs(ARCHIVE_ATTEMPT_TIMEOUT_SECS),
            self.archive_service.archive(&snapshot),
        )
        .await;

        let result = match attempt {
            Ok(r) => r.map(|_| ()),
            Err(_) => Err(crate::sessions::archive::ArchiveError::Database(
                "archive attempt timed out".to_string(),
            )),
        };

        match result {
            Ok(()) => {
                if let Err(e) = archive_queue::complete(&self.pool, entry.id).await {
                    // Next attempt hits the idempotency check and cleans up
                    tracing::error!(entry_id = entry.id, error = %e, "Failed to complete archive cleanup");
                }
            }
            Err(e) => {
                tracing::error!(
                    entry_id = entry.id,
                    retry_count = entry.retry_count,
                    error = %e,
                    "Archive failed"
                );
                if let Err(e2) =
                    archive_queue::record_failure(&self.pool, entry.id, &e.to_string()).await
                {
                    tracing::error!(entry_id = entry.id, error = %e2, "Failed to record archive failure");
                }
            }
        }
    }
}

/// Exponential backoff gate: delay = base * 2^retry_count, capped
fn backoff_elapsed(entry: &PendingArchive, now: i64) -> bool {
    if entry.retry_count == 0 {
        return true;
    }
    let delay_secs = (RETRY_BASE_DELAY_SECS * 2u64.pow(entry.retry_count as u32))
        .min(RETRY_MAX_DELAY_SECS);
    let retry_after_ms = entry.created_at + (delay_secs as i64 * 1000);
    now >= retry_after_ms
}
