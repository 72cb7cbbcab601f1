//! Errors returned by the storage backends.

use thiserror::Error;

use crate::{inmemory::errors::InMemoryError, persistent::errors::StorageError};

/// Errors that can occur when interacting with any of the storage backends.
#[derive(Debug, Error)]
pub enum DbError {
    /// Error from the SQLite backend.
    #[error("sqlite: {0}")]
    Storage(#[from] StorageError),

    /// Error from the in-memory backend.
    #[error("memory: {0}")]
    InMemory(#[from] InMemoryError),
}

impl DbError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DbError::Storage(err) => err.is_transient(),
            DbError::InMemory(_) => false,
        }
    }
}

/// Result type for all storage operations.
pub type DbResult<T> = Result<T, DbError>;
