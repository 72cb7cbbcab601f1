//! The closed set of states a BTC delegation can be in, along with the substates that record why a
//! delegation reached its current state.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The lifecycle state of a BTC delegation.
///
/// [`DelegationState::Pending`] is the initial state. [`DelegationState::Withdrawn`] and
/// [`DelegationState::Slashed`] are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DelegationState {
    /// The staking transaction has been observed but the covenant committee has not yet reached
    /// quorum on it.
    Pending,

    /// The covenant committee has reached quorum.
    Verified,

    /// The staking transaction has been included on the Bitcoin chain with enough confirmations.
    Active,

    /// An unbonding transaction spending the staking output has been observed.
    Unbonding,

    /// The stake is no longer locked and can be withdrawn.
    Unbonded,

    /// The stake has been withdrawn.
    Withdrawn,

    /// The stake has been slashed.
    Slashed,
}

impl DelegationState {
    /// All the states in lifecycle order.
    pub const ALL: [DelegationState; 7] = [
        DelegationState::Pending,
        DelegationState::Verified,
        DelegationState::Active,
        DelegationState::Unbonding,
        DelegationState::Unbonded,
        DelegationState::Withdrawn,
        DelegationState::Slashed,
    ];

    /// Whether no further transition may leave this state.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, DelegationState::Withdrawn | DelegationState::Slashed)
    }

    /// The canonical string representation of this state as persisted.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DelegationState::Pending => "PENDING",
            DelegationState::Verified => "VERIFIED",
            DelegationState::Active => "ACTIVE",
            DelegationState::Unbonding => "UNBONDING",
            DelegationState::Unbonded => "UNBONDED",
            DelegationState::Withdrawn => "WITHDRAWN",
            DelegationState::Slashed => "SLASHED",
        }
    }
}

impl Display for DelegationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DelegationState {
    type Err = UnknownVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DelegationState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownVariantError::State(s.to_string()))
    }
}

/// Refinement of a [`DelegationState`] that records which spend path led to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DelegationSubState {
    /// The staking timelock path.
    Timelock,

    /// The unbonding path, taken before the staking timelock expired.
    EarlyUnbonding,
}

impl DelegationSubState {
    /// All the substates.
    pub const ALL: [DelegationSubState; 2] = [
        DelegationSubState::Timelock,
        DelegationSubState::EarlyUnbonding,
    ];

    /// The canonical string representation of this substate as persisted.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DelegationSubState::Timelock => "TIMELOCK",
            DelegationSubState::EarlyUnbonding => "EARLY_UNBONDING",
        }
    }
}

impl Display for DelegationSubState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DelegationSubState {
    type Err = UnknownVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DelegationSubState::ALL
            .into_iter()
            .find(|sub_state| sub_state.as_str() == s)
            .ok_or_else(|| UnknownVariantError::SubState(s.to_string()))
    }
}

/// The output of a delegation that a slashing transaction spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlashedOutput {
    /// The staking output, slashed while the stake was active.
    Staking,

    /// The unbonding output, slashed while the stake was unbonding.
    Unbonding,
}

impl SlashedOutput {
    /// The canonical string representation of this output as persisted.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SlashedOutput::Staking => "STAKING",
            SlashedOutput::Unbonding => "UNBONDING",
        }
    }
}

impl Display for SlashedOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlashedOutput {
    type Err = UnknownVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [SlashedOutput::Staking, SlashedOutput::Unbonding]
            .into_iter()
            .find(|output| output.as_str() == s)
            .ok_or_else(|| UnknownVariantError::SlashedOutput(s.to_string()))
    }
}

/// Error returned when parsing a state or substate from an unknown string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnknownVariantError {
    /// The string does not name a [`DelegationState`].
    #[error("unknown delegation state: {0}")]
    State(String),

    /// The string does not name a [`DelegationSubState`].
    #[error("unknown delegation substate: {0}")]
    SubState(String),

    /// The string does not name a [`SlashedOutput`].
    #[error("unknown slashed output: {0}")]
    SlashedOutput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_string_roundtrip() {
        for state in DelegationState::ALL {
            assert_eq!(state.to_string().parse::<DelegationState>(), Ok(state));
        }

        for sub_state in DelegationSubState::ALL {
            assert_eq!(
                sub_state.to_string().parse::<DelegationSubState>(),
                Ok(sub_state)
            );
        }

        assert_eq!("UNBONDING".parse(), Ok(SlashedOutput::Unbonding));

        assert_eq!(
            "ACTIVATED".parse::<DelegationState>(),
            Err(UnknownVariantError::State("ACTIVATED".to_string()))
        );
    }

    #[test]
    fn test_serde_matches_display() {
        let json = serde_json::to_string(&DelegationSubState::EarlyUnbonding).unwrap();
        assert_eq!(json, "\"EARLY_UNBONDING\"");

        let state: DelegationState = serde_json::from_str("\"UNBONDING\"").unwrap();
        assert_eq!(state, DelegationState::Unbonding);
    }

    #[test]
    fn test_terminal_states() {
        let terminal = DelegationState::ALL
            .into_iter()
            .filter(DelegationState::is_terminal)
            .collect::<Vec<_>>();

        assert_eq!(
            terminal,
            vec![DelegationState::Withdrawn, DelegationState::Slashed]
        );
    }
}
