//! Database Module
//!
//! Handles the SQLite connection pools and migrations. The pools are
//! constructed explicitly at startup and injected into the server
//! state; nothing in the crate lazily opens its own connection.
//!
//! Two pools over the same WAL database: a read pool with several
//! connections, and a single-connection write pool. Funneling every
//! write transaction through one connection keeps writers strictly
//! serialized, so a deferred transaction can never fail on a stale
//! snapshot mid-operation.

pub mod models;
pub mod repository;

use crate::utils::AppError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;

/// Database service - owns the SQLite connection pools
#[derive(Clone)]
pub struct DbService {
    /// Read pool (several connections)
    pub pool: SqlitePool,
    /// Write pool (single connection, serializes all write transactions)
    pub write_pool: SqlitePool,
}

impl DbService {
    /// Create a new database service with WAL mode and separate
    /// read/write pools
    pub async fn new(db_path: &str) -> Result<Self, AppError> {
        // Build connection options: WAL, foreign keys, normal sync
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| AppError::Database(format!("Invalid database path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON")
            .optimize_on_close(true, None);

        let write_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database: {e}")))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database: {e}")))?;

        // busy_timeout: wait up to 5s on write contention instead of failing
        for p in [&write_pool, &pool] {
            sqlx::query("PRAGMA busy_timeout = 5000;")
                .execute(p)
                .await
                .map_err(|e| AppError::Database(format!("Failed to set busy_timeout: {e}")))?;
        }

        tracing::info!("Database connection established (SQLite WAL, busy_timeout=5000ms)");

        Self::migrate(&write_pool).await?;

        Ok(Self { pool, write_pool })
    }

    /// Create an in-memory database service (tests and tooling).
    ///
    /// A single shared connection backs both pools so every query sees
    /// the same `:memory:` database.
    pub async fn new_in_memory() -> Result<Self, AppError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| AppError::Database(format!("Failed to open in-memory database: {e}")))?;

        Self::migrate(&pool).await?;

        Ok(Self {
            pool: pool.clone(),
            write_pool: pool,
        })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to apply migrations: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Close the pools (clean shutdown)
    pub async fn close(&self) {
        self.pool.close().await;
        self.write_pool.close().await;
    }
}
