//! In-memory implementation of the storage traits.
//!
//! Useful for tests and for embedding the tracker without a database.

pub mod errors;
pub mod store;

pub use store::StakingDbInMemory;
