//! Error types for RSSY.

use thiserror::Error;

/// Common error type for RSSY.
#[derive(Error, Debug)]
pub enum RssyError {
    /// Database error.
    ///
    /// Errors from sqlx are converted automatically; unique-constraint
    /// violations become [`RssyError::Conflict`] instead.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Feed retrieval or parsing error.
    #[error("feed error: {0}")]
    Feed(String),

    /// Invalid poller lifecycle transition.
    #[error("poller error: {0}")]
    Poller(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RssyError {
    /// Whether this error is a uniqueness conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, RssyError::Conflict(_))
    }
}

impl From<sqlx::Error> for RssyError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                RssyError::Conflict(db_err.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                RssyError::DatabaseConnection(e.to_string())
            }
            _ => RssyError::Database(e.to_string()),
        }
    }
}

/// Result type alias for RSSY operations.
pub type Result<T> = std::result::Result<T, RssyError>;
