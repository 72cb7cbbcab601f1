//! Interface to persisted progress cursors.

use async_trait::async_trait;
use staking_primitives::types::BitcoinBlockHeight;

use crate::{
    errors::DbResult,
    types::{Cursor, CursorOutcome},
};

/// Interface to named, versioned progress cursors.
///
/// Cursors replace any in-memory "last processed height" so that progress survives restarts and
/// concurrent workers cannot silently overwrite each other.
#[async_trait]
pub trait CursorDb {
    /// Gets the cursor with the given name, or [`Cursor::default`] if it was never advanced.
    async fn get_cursor(&self, name: &str) -> DbResult<Cursor>;

    /// Sets the cursor to `height` if its current version is `expected_version`.
    async fn advance_cursor(
        &self,
        name: &str,
        expected_version: u64,
        height: BitcoinBlockHeight,
    ) -> DbResult<CursorOutcome>;
}
