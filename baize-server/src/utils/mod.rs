//! Utility module - shared helpers and types
//!
//! - [`AppError`] / [`AppResponse`] - unified error and response types
//! - [`logger`] - tracing setup
//! - [`time`] - epoch-millisecond helpers
//! - [`id`] - snowflake ID generation

pub mod error;
pub mod id;
pub mod logger;
pub mod time;

pub use error::{AppError, AppResponse, ok, ok_with_message};

/// Result type for API handlers
pub type AppResult<T> = Result<T, AppError>;
