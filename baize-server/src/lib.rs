//! Baize Server - billiard venue table session and billing engine
//!
//! # Architecture overview
//!
//! - **Sessions** (`sessions`): table lifecycle state machine,
//!   consumption ledger coupled to stock, pure billing, best-effort
//!   transaction archiver
//! - **Database** (`db`): embedded SQLite storage and repositories
//! - **HTTP API** (`api`): RESTful interface per resource
//! - **Core** (`core`): configuration, state, server lifecycle
//!
//! # Module structure
//!
//! ```text
//! baize-server/src/
//! ├── core/          # Config, ServerState, Server
//! ├── api/           # HTTP routes and handlers
//! ├── sessions/      # session engine + archiver
//! ├── db/            # models, repositories, pool
//! └── utils/         # errors, logging, time, ids
//! ```

pub mod api;
pub mod core;
pub mod db;
pub mod sessions;
pub mod utils;

// Re-export public types
pub use crate::core::{Config, Server, ServerState};
pub use crate::sessions::{Bill, SessionError, SessionManager};
pub use crate::utils::{AppError, AppResponse, AppResult};

// Re-export logger functions
pub use crate::utils::logger::{init_logger, init_logger_with_file};

/// Prepare the process environment: .env file, then logging.
///
/// Called once at the top of `main`, before configuration is read.
pub fn setup_environment() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());

    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
    ____        _
   / __ )____ _(_)___  ___
  / __  / __ `/ /_  / / _ \
 / /_/ / /_/ / / / /_/  __/
/_____/\__,_/_/ /___/\___/
        table session server v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
