//! Errors from the in-memory backend.

use thiserror::Error;

/// Errors that can occur when operating on the in-memory store.
#[derive(Debug, Error)]
pub enum InMemoryError {
    /// The operation requires a delegation that has not been saved.
    #[error("delegation not found")]
    NotFound,
}
