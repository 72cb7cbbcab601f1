//! Storage for BTC delegation records, timelock markers and scan cursors.
//!
//! The traits in this crate are the only way the rest of the workspace touches durable state. Every
//! write is a single atomic operation scoped to one delegation (or one marker, or one cursor) so
//! that concurrent writers coordinate through preconditions instead of locks.

pub mod cursor;
pub mod delegation;
pub mod errors;
pub mod inmemory;
pub mod persistent;
pub mod timelock;
pub mod types;

#[cfg(test)]
mod test_suite;
