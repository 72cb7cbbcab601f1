//! The delegation transition table.
//!
//! Every transition names the exact set of states it may be applied from. There is no implicit
//! fallback: a state that is not listed for a transition rejects it.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use staking_primitives::state::{DelegationState, DelegationSubState};
use thiserror::Error;

/// The kinds of chain observations that move a delegation from one state to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionKind {
    /// The covenant committee has reached quorum on the delegation.
    CovenantQuorumReached,

    /// The staking transaction is buried under enough blocks.
    InclusionProofConfirmed,

    /// An unbonding transaction spending the staking output has been observed.
    UnbondingTxObserved,

    /// The unbonding transaction is confirmed and its output spendable.
    UnbondingTxConfirmed,

    /// The timelock of the given spend path has expired.
    TimelockExpired(DelegationSubState),

    /// A withdrawal of the stake has been observed.
    WithdrawalTxObserved,

    /// A slashing transaction has been observed.
    SlashingTxObserved,
}

impl TransitionKind {
    /// The states this transition may be applied from.
    pub const fn qualified_previous_states(&self) -> &'static [DelegationState] {
        use DelegationState::*;

        match self {
            TransitionKind::CovenantQuorumReached => &[Pending],
            TransitionKind::InclusionProofConfirmed => &[Verified, Pending],
            TransitionKind::UnbondingTxObserved => &[Active],
            TransitionKind::UnbondingTxConfirmed => &[Unbonding],
            TransitionKind::TimelockExpired(DelegationSubState::Timelock) => &[Active],
            TransitionKind::TimelockExpired(DelegationSubState::EarlyUnbonding) => &[Unbonding],
            TransitionKind::WithdrawalTxObserved => &[Unbonded, Active],
            TransitionKind::SlashingTxObserved => &[Active, Unbonding],
        }
    }

    /// The state this transition leads to.
    pub const fn next_state(&self) -> DelegationState {
        match self {
            TransitionKind::CovenantQuorumReached => DelegationState::Verified,
            TransitionKind::InclusionProofConfirmed => DelegationState::Active,
            TransitionKind::UnbondingTxObserved => DelegationState::Unbonding,
            TransitionKind::UnbondingTxConfirmed | TransitionKind::TimelockExpired(_) => {
                DelegationState::Unbonded
            }
            TransitionKind::WithdrawalTxObserved => DelegationState::Withdrawn,
            TransitionKind::SlashingTxObserved => DelegationState::Slashed,
        }
    }

    /// The substate written by this transition when leaving `current`, or `None` to keep it.
    const fn next_sub_state(&self, current: DelegationState) -> Option<DelegationSubState> {
        match (self, current) {
            (TransitionKind::UnbondingTxConfirmed, _) => Some(DelegationSubState::EarlyUnbonding),
            (TransitionKind::TimelockExpired(sub_state), _) => Some(*sub_state),
            // spending the staking output directly is only possible once its timelock is over
            (TransitionKind::WithdrawalTxObserved, DelegationState::Active) => {
                Some(DelegationSubState::Timelock)
            }
            _ => None,
        }
    }
}

impl Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionKind::CovenantQuorumReached => write!(f, "covenant-quorum-reached"),
            TransitionKind::InclusionProofConfirmed => write!(f, "inclusion-proof-confirmed"),
            TransitionKind::UnbondingTxObserved => write!(f, "unbonding-tx-observed"),
            TransitionKind::UnbondingTxConfirmed => write!(f, "unbonding-tx-confirmed"),
            TransitionKind::TimelockExpired(sub_state) => write!(f, "timelock-expired({sub_state})"),
            TransitionKind::WithdrawalTxObserved => write!(f, "withdrawal-tx-observed"),
            TransitionKind::SlashingTxObserved => write!(f, "slashing-tx-observed"),
        }
    }
}

/// An accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// The state the delegation is in before the transition.
    pub from: DelegationState,

    /// The state the delegation is in after the transition.
    pub to: DelegationState,

    /// The new substate, `None` if the current one is kept.
    pub sub_state: Option<DelegationSubState>,
}

/// A transition requested from a state that is not in its qualified set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} is not allowed from {current}")]
pub struct Rejection {
    /// The state the delegation is in.
    pub current: DelegationState,

    /// The requested transition.
    pub kind: TransitionKind,
}

/// Checks whether `kind` may be applied to a delegation in the `current` state and, if so, which
/// state and substate it leads to.
pub fn validate(current: DelegationState, kind: TransitionKind) -> Result<Transition, Rejection> {
    if !kind.qualified_previous_states().contains(&current) {
        return Err(Rejection { current, kind });
    }

    Ok(Transition {
        from: current,
        to: kind.next_state(),
        sub_state: kind.next_sub_state(current),
    })
}
