//! Errors for the staking parameters.

use bitcoin::{Amount, XOnlyPublicKey};
use staking_primitives::types::{ParamsVersion, TimelockBlocks};
use thiserror::Error;

/// Error while registering or validating a set of parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    /// The quorum is zero or larger than the covenant committee.
    #[error("covenant quorum {quorum} is invalid for a committee of {committee_size}")]
    InvalidQuorum {
        /// The configured quorum.
        quorum: u32,

        /// The number of covenant keys.
        committee_size: usize,
    },

    /// The same covenant key appears more than once.
    #[error("duplicate covenant key: {0}")]
    DuplicateCovenantKey(XOnlyPublicKey),

    /// A `min` bound is greater than its `max` bound.
    #[error("invalid {name} bounds: min {min} > max {max}")]
    InvalidBounds {
        /// The name of the bounded quantity.
        name: &'static str,

        /// The lower bound.
        min: u64,

        /// The upper bound.
        max: u64,
    },

    /// A version is already registered with different contents.
    #[error("params version {0} is already registered with different contents")]
    VersionConflict(ParamsVersion),
}

/// Ways in which the terms of a delegation can violate the staking parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TermsViolation {
    /// The staking amount is outside of the accepted range.
    #[error("staking amount {amount} is outside of [{min}, {max}]")]
    StakingAmount {
        /// The staked amount.
        amount: Amount,

        /// The minimum accepted amount.
        min: Amount,

        /// The maximum accepted amount.
        max: Amount,
    },

    /// The staking timelock is outside of the accepted range.
    #[error("staking time {time} is outside of [{min}, {max}]")]
    StakingTime {
        /// The staking timelock.
        time: TimelockBlocks,

        /// The minimum accepted timelock.
        min: TimelockBlocks,

        /// The maximum accepted timelock.
        max: TimelockBlocks,
    },

    /// The unbonding timelock is shorter than required.
    #[error("unbonding time {time} is below the minimum of {min}")]
    UnbondingTime {
        /// The unbonding timelock.
        time: TimelockBlocks,

        /// The minimum accepted timelock.
        min: TimelockBlocks,
    },
}
