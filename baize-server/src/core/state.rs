//! Server State
//!
//! Holds the shared handles every request needs: configuration, the
//! database service and the session engine. Constructed once at startup
//! (explicit lifecycle, no lazy globals) and cheaply cloned into
//! handlers via `Arc`s.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::core::Config;
use crate::db::DbService;
use crate::sessions::{ArchiveWorker, SessionManager};
use crate::utils::AppError;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration (immutable)
    pub config: Config,
    /// Database service (SQLite pool)
    pub db: DbService,
    /// Table session engine
    pub sessions: Arc<SessionManager>,
    /// Receiving end of the archive nudge channel, consumed when the
    /// background tasks start
    archive_rx: Arc<Mutex<Option<mpsc::Receiver<()>>>>,
}

impl ServerState {
    /// Initialize the server state in order:
    ///
    /// 1. working directory structure
    /// 2. database (work_dir/database/baize.db) + migrations
    /// 3. session engine
    pub async fn initialize(config: &Config) -> Result<Self, AppError> {
        let db_dir = config.database_dir();
        std::fs::create_dir_all(&db_dir)
            .map_err(|e| AppError::Internal(format!("Failed to create work directory: {e}")))?;
        std::fs::create_dir_all(config.log_dir())
            .map_err(|e| AppError::Internal(format!("Failed to create log directory: {e}")))?;

        let db_path = db_dir.join("baize.db");
        let db = DbService::new(&db_path.to_string_lossy()).await?;

        Ok(Self::with_db(config.clone(), db))
    }

    /// Initialize against an in-memory database (tests)
    pub async fn initialize_in_memory(config: &Config) -> Result<Self, AppError> {
        let db = DbService::new_in_memory().await?;
        Ok(Self::with_db(config.clone(), db))
    }

    fn with_db(config: Config, db: DbService) -> Self {
        let (sessions, archive_rx) = SessionManager::new(&db, config.request_timeout());

        Self {
            config,
            db,
            sessions: Arc::new(sessions),
            archive_rx: Arc::new(Mutex::new(Some(archive_rx))),
        }
    }

    /// Start background tasks. Must be called before serving requests;
    /// calling it twice is a no-op.
    pub fn start_background_tasks(&self) {
        let rx = self
            .archive_rx
            .lock()
            .expect("archive receiver mutex poisoned")
            .take();
        if let Some(rx) = rx {
            let worker = ArchiveWorker::new(self.db.write_pool.clone());
            tokio::spawn(worker.run(rx));
        }
    }

    /// Clean shutdown: close the database pool
    pub async fn shutdown(&self) {
        self.db.close().await;
        tracing::info!("Server state shut down");
    }
}
