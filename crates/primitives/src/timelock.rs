//! Markers that schedule the expiry of a delegation's timelock.

use std::cmp::Ordering;

use bitcoin::{hashes::Hash, Txid};
use serde::{Deserialize, Serialize};

use crate::{state::DelegationSubState, types::BitcoinBlockHeight};

/// A unit of expiry work: once the Bitcoin tip reaches `expire_height`, the delegation identified
/// by `staking_txid` has to go through the expiry transition for `sub_state`.
///
/// Markers are identified by all three fields. Their [`Ord`] is the order in which expiry work is
/// processed: ascending height, then txid as displayed (big-endian hex), then substate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeLockMarker {
    /// The height at which the timelock expires.
    pub expire_height: BitcoinBlockHeight,

    /// The staking transaction of the delegation the timelock belongs to.
    pub staking_txid: Txid,

    /// The spend path whose timelock expires.
    pub sub_state: DelegationSubState,
}

impl TimeLockMarker {
    /// Creates a new [`TimeLockMarker`].
    pub const fn new(
        staking_txid: Txid,
        expire_height: BitcoinBlockHeight,
        sub_state: DelegationSubState,
    ) -> Self {
        Self {
            expire_height,
            staking_txid,
            sub_state,
        }
    }

    /// Whether the timelock has expired at the given tip height.
    pub const fn is_due(&self, tip_height: BitcoinBlockHeight) -> bool {
        self.expire_height <= tip_height
    }
}

impl Ord for TimeLockMarker {
    fn cmp(&self, other: &Self) -> Ordering {
        self.expire_height
            .cmp(&other.expire_height)
            .then_with(|| {
                display_bytes(&self.staking_txid).cmp(&display_bytes(&other.staking_txid))
            })
            .then_with(|| self.sub_state.cmp(&other.sub_state))
    }
}

impl PartialOrd for TimeLockMarker {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The txid bytes in the order they are displayed in, which is the reverse of the internal order.
fn display_bytes(txid: &Txid) -> [u8; 32] {
    let mut bytes = txid.to_byte_array();
    bytes.reverse();

    bytes
}
