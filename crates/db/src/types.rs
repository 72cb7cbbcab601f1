//! Requests and outcomes of the storage operations.
//!
//! Outcomes that are expected under concurrent or duplicate delivery (a row already existing, a
//! precondition no longer holding) are modelled as values rather than errors. Errors are reserved
//! for the storage backend being unable to serve the request.

use serde::{Deserialize, Serialize};
use staking_primitives::{
    delegation::SlashingRecord,
    state::{DelegationState, DelegationSubState},
    timelock::TimeLockMarker,
    types::BitcoinBlockHeight,
};

/// Outcome of inserting a row identified by a unique key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was inserted.
    Inserted,

    /// A row with the same key already exists and was left untouched.
    AlreadyExists,
}

/// Outcome of a conditional state update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The precondition held and the update was applied.
    Applied,

    /// The delegation was not in any of the qualified states, nothing was written.
    PreconditionFailed,
}

/// Outcome of saving a covenant signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureOutcome {
    /// The signature was stored. `total` is the number of distinct covenant signatures stored
    /// for the delegation right after this insert.
    Inserted {
        /// The signature count including this one.
        total: usize,
    },

    /// The covenant key already has a signature stored for this delegation.
    AlreadyExists,
}

/// Outcome of deleting a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The row was deleted.
    Deleted,

    /// There was no such row.
    NotFound,
}

/// A conditional state update: "set `state = to_state` where `state ∈ from_states`".
///
/// When a timelock is attached, the marker is created and the delegation's expiry height is set
/// in the same atomic write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateUpdate {
    /// The states the delegation must currently be in for the update to apply.
    pub from_states: Vec<DelegationState>,

    /// The new state.
    pub to_state: DelegationState,

    /// The new substate. `None` leaves the current substate unchanged.
    pub to_sub_state: Option<DelegationSubState>,

    /// The staking start height to record, if any.
    pub start_height: Option<BitcoinBlockHeight>,

    /// The timelock introduced by this transition, if any.
    pub timelock: Option<TimeLockMarker>,

    /// The slashing transaction that caused this transition, if any.
    pub slashing: Option<SlashingRecord>,
}

impl StateUpdate {
    /// Creates an update moving a delegation out of any of `from_states` into `to_state`.
    pub fn new(from_states: impl Into<Vec<DelegationState>>, to_state: DelegationState) -> Self {
        Self {
            from_states: from_states.into(),
            to_state,
            to_sub_state: None,
            start_height: None,
            timelock: None,
            slashing: None,
        }
    }

    /// Sets the substate written along with the new state.
    pub fn with_sub_state(mut self, sub_state: Option<DelegationSubState>) -> Self {
        self.to_sub_state = sub_state;
        self
    }

    /// Sets the staking start height written along with the new state.
    pub fn with_start_height(mut self, height: BitcoinBlockHeight) -> Self {
        self.start_height = Some(height);
        self
    }

    /// Attaches the timelock marker to create along with the new state.
    pub fn with_timelock(mut self, marker: TimeLockMarker) -> Self {
        self.timelock = Some(marker);
        self
    }

    /// Records the slashing transaction along with the new state.
    pub fn with_slashing(mut self, slashing: SlashingRecord) -> Self {
        self.slashing = Some(slashing);
        self
    }
}

/// A persisted, versioned progress cursor (e.g. the last scanned Bitcoin height).
///
/// The version increases by one on every advance. A cursor that was never written has version 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// The height the cursor points at.
    pub height: BitcoinBlockHeight,

    /// The number of times this cursor has been advanced.
    pub version: u64,
}

/// Outcome of a compare-and-swap cursor advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorOutcome {
    /// The cursor was advanced to the contained value.
    Advanced(Cursor),

    /// The cursor was not at the expected version; the contained value is the current one.
    Stale(Cursor),
}
