//! Persistent database errors.

use thiserror::Error;

/// Primary SQLite result codes for a database file or table being locked by another connection.
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

/// Errors that can occur when interacting with the database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An error occurred when interacting with the SQLite database.
    #[error("sqlite: {0}")]
    Driver(#[from] sqlx::Error),

    /// An error occurred when converting between types.
    #[error("conversion: {0}")]
    MismatchedTypes(String),

    /// An error occurred when validating data.
    #[error("data: {0}")]
    InvalidData(String),
}

impl StorageError {
    /// Whether the error is caused by contention or connectivity rather than by the request.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Driver(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => true,
            StorageError::Driver(sqlx::Error::Database(db_err)) => db_err
                .code()
                .and_then(|code| code.parse::<i64>().ok())
                .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
            _ => false,
        }
    }
}
