//! Table Session Engine
//!
//! The core of the server: table lifecycle state machine, consumption
//! recording coupled to stock, pure billing computation, and the
//! best-effort transaction archiver.
//!
//! - [`SessionManager`] - open/close/consume with per-table serialization
//! - [`billing`] - pure bill computation
//! - [`TransactionArchiveService`] / [`ArchiveWorker`] - durable,
//!   best-effort history

pub mod archive;
pub mod archive_worker;
pub mod billing;
pub mod error;
pub mod manager;

pub use archive::{ArchiveError, ArchiveSnapshot, TransactionArchiveService};
pub use archive_worker::ArchiveWorker;
pub use billing::{Bill, compute_bill};
pub use error::{SessionError, SessionResult};
pub use manager::SessionManager;
