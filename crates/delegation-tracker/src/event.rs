//! Chain observations delivered to the [`DelegationEngine`](crate::engine::DelegationEngine).

use bitcoin::{Transaction, Txid};
use serde::{Deserialize, Serialize};
use staking_primitives::{
    delegation::NewDelegation, state::DelegationSubState, types::BitcoinBlockHeight,
};

use crate::transition::TransitionKind;

/// An event concerning a single delegation.
///
/// Events may arrive out of order or more than once. The engine only applies those that are valid
/// for the current state of the delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelegationEvent {
    /// A staking transaction has been observed for the first time.
    NewStake(NewDelegation),

    /// The covenant committee has reached quorum on the delegation.
    CovenantQuorumReached {
        /// The delegation.
        staking_txid: Txid,
    },

    /// The staking transaction has been included in a block.
    InclusionProofConfirmed {
        /// The delegation.
        staking_txid: Txid,

        /// The height of the block including the staking transaction.
        inclusion_height: BitcoinBlockHeight,

        /// The Bitcoin tip at the time of observation.
        tip_height: BitcoinBlockHeight,
    },

    /// An unbonding transaction spending the staking output has been observed.
    UnbondingTxObserved {
        /// The delegation.
        staking_txid: Txid,

        /// The height at which the unbonding transaction was observed.
        observed_height: BitcoinBlockHeight,
    },

    /// The unbonding transaction is confirmed.
    UnbondingTxConfirmed {
        /// The delegation.
        staking_txid: Txid,
    },

    /// The timelock of a spend path has expired.
    TimelockExpired {
        /// The delegation.
        staking_txid: Txid,

        /// The spend path whose timelock expired.
        sub_state: DelegationSubState,
    },

    /// The stake has been withdrawn.
    WithdrawalTxObserved {
        /// The delegation.
        staking_txid: Txid,
    },

    /// The stake has been slashed.
    SlashingTxObserved {
        /// The delegation.
        staking_txid: Txid,

        /// The transaction that spent the staking or unbonding output to the slashing script.
        slashing_tx: Transaction,

        /// The height at which the slashing transaction was included.
        spend_height: BitcoinBlockHeight,
    },
}

impl DelegationEvent {
    /// The delegation this event is about.
    pub const fn staking_txid(&self) -> Txid {
        match self {
            DelegationEvent::NewStake(delegation) => delegation.staking_txid,
            DelegationEvent::CovenantQuorumReached { staking_txid }
            | DelegationEvent::InclusionProofConfirmed { staking_txid, .. }
            | DelegationEvent::UnbondingTxObserved { staking_txid, .. }
            | DelegationEvent::UnbondingTxConfirmed { staking_txid }
            | DelegationEvent::TimelockExpired { staking_txid, .. }
            | DelegationEvent::WithdrawalTxObserved { staking_txid }
            | DelegationEvent::SlashingTxObserved { staking_txid, .. } => *staking_txid,
        }
    }

    /// The transition this event requests, `None` for the creation of a delegation.
    pub const fn transition_kind(&self) -> Option<TransitionKind> {
        Some(match self {
            DelegationEvent::NewStake(_) => return None,
            DelegationEvent::CovenantQuorumReached { .. } => TransitionKind::CovenantQuorumReached,
            DelegationEvent::InclusionProofConfirmed { .. } => {
                TransitionKind::InclusionProofConfirmed
            }
            DelegationEvent::UnbondingTxObserved { .. } => TransitionKind::UnbondingTxObserved,
            DelegationEvent::UnbondingTxConfirmed { .. } => TransitionKind::UnbondingTxConfirmed,
            DelegationEvent::TimelockExpired { sub_state, .. } => {
                TransitionKind::TimelockExpired(*sub_state)
            }
            DelegationEvent::WithdrawalTxObserved { .. } => TransitionKind::WithdrawalTxObserved,
            DelegationEvent::SlashingTxObserved { .. } => TransitionKind::SlashingTxObserved,
        })
    }
}
