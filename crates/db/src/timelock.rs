//! Interface to the timelock expiry work queue.

use async_trait::async_trait;
use staking_primitives::{timelock::TimeLockMarker, types::BitcoinBlockHeight};

use crate::{
    errors::DbResult,
    types::{DeleteOutcome, InsertOutcome},
};

/// Interface to the [`TimeLockMarker`]s that schedule expiry transitions.
#[async_trait]
pub trait TimeLockDb {
    /// Saves a marker. Markers are deduplicated by their full key.
    async fn save_timelock_marker(&self, marker: &TimeLockMarker) -> DbResult<InsertOutcome>;

    /// Finds at most `limit` markers whose expire height is at or below `tip_height`, in the
    /// [`Ord`] order of [`TimeLockMarker`].
    ///
    /// With `after` set, only markers strictly greater than it are returned. This pages through
    /// the due markers without relying on the earlier ones having been deleted.
    async fn find_expired_markers(
        &self,
        tip_height: BitcoinBlockHeight,
        after: Option<&TimeLockMarker>,
        limit: usize,
    ) -> DbResult<Vec<TimeLockMarker>>;

    /// Deletes a marker once its expiry transition has been durably handled.
    async fn delete_timelock_marker(&self, marker: &TimeLockMarker) -> DbResult<DeleteOutcome>;
}
