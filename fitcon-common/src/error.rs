//! Common error types for fitcon

use thiserror::Error;

/// Common result type for fitcon operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the fitcon crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed observation or invalid parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error means storage as a whole is unusable.
    ///
    /// Fatal errors abort a batch run. Everything else (constraint
    /// violations, malformed rows, lock timeouts) is contained to the part
    /// number being processed.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Database(db_err) => matches!(
                db_err,
                sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)
            ),
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// Whether this is SQLite reporting lock contention
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Error::Database(db_err) => {
                let msg = db_err.to_string();
                msg.contains("database is locked") || msg.contains("database table is locked")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_fatal() {
        assert!(Error::Database(sqlx::Error::PoolClosed).is_fatal());
        assert!(Error::Database(sqlx::Error::PoolTimedOut).is_fatal());
    }

    #[test]
    fn test_row_level_errors_are_recoverable() {
        assert!(!Error::Database(sqlx::Error::RowNotFound).is_fatal());
        assert!(!Error::InvalidInput("empty make".to_string()).is_fatal());
        assert!(!Error::Config("bad weight".to_string()).is_fatal());
    }

    #[test]
    fn test_lock_contention_detection() {
        let err = Error::Database(sqlx::Error::Protocol("database is locked".to_string()));
        assert!(err.is_lock_contention());
        assert!(!Error::Database(sqlx::Error::RowNotFound).is_lock_contention());
    }
}
