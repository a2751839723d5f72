//! Session engine errors

use crate::db::repository::RepoError;
use crate::utils::AppError;
use thiserror::Error;

/// Errors surfaced by the table session engine.
///
/// Everything here is propagated to the caller; archive failures never
/// appear because they are handled off the close path (see
/// [`super::archive_worker`]).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("Product not available: {0}")]
    ProductUnavailable(String),

    #[error("Insufficient stock. Available: {available}")]
    InsufficientStock { available: i64 },

    #[error("{0}")]
    Validation(String),

    #[error("Operation timed out: {0}")]
    Timeout(&'static str),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(msg) => AppError::NotFound(msg),
            SessionError::InvalidState(msg) => AppError::BusinessRule(msg),
            SessionError::ProductUnavailable(_) => AppError::BusinessRule(err.to_string()),
            SessionError::InsufficientStock { .. } => AppError::BusinessRule(err.to_string()),
            SessionError::Validation(msg) => AppError::Validation(msg),
            SessionError::Timeout(op) => AppError::Timeout(op.to_string()),
            SessionError::Repo(repo) => repo.into(),
        }
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
