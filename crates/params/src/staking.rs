//! Parameters of the BTC staking module of the consensus chain.

use std::collections::BTreeSet;

use bitcoin::{Amount, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use staking_primitives::{
    delegation::NewDelegation,
    types::{ParamsVersion, TimelockBlocks},
};

use crate::errors::{ParamsError, TermsViolation};

/// A single version of the staking parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingParams {
    /// The version of these parameters.
    pub version: ParamsVersion,

    /// The keys of the covenant committee.
    pub covenant_pks: Vec<XOnlyPublicKey>,

    /// The number of distinct covenant signatures required to verify a delegation.
    pub covenant_quorum: u32,

    /// The minimum amount that can be staked.
    pub min_staking_value: Amount,

    /// The maximum amount that can be staked.
    pub max_staking_value: Amount,

    /// The minimum staking timelock in blocks.
    pub min_staking_time_blocks: TimelockBlocks,

    /// The maximum staking timelock in blocks.
    pub max_staking_time_blocks: TimelockBlocks,

    /// The minimum unbonding timelock in blocks.
    pub min_unbonding_time_blocks: TimelockBlocks,
}

impl StakingParams {
    /// Checks that the parameters are internally consistent.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let committee_size = self.covenant_pks.len();
        if self.covenant_quorum == 0 || self.covenant_quorum as usize > committee_size {
            return Err(ParamsError::InvalidQuorum {
                quorum: self.covenant_quorum,
                committee_size,
            });
        }

        let mut seen = BTreeSet::new();
        if let Some(duplicate) = self.covenant_pks.iter().find(|pk| !seen.insert(**pk)) {
            return Err(ParamsError::DuplicateCovenantKey(*duplicate));
        }

        if self.min_staking_value > self.max_staking_value {
            return Err(ParamsError::InvalidBounds {
                name: "staking value",
                min: self.min_staking_value.to_sat(),
                max: self.max_staking_value.to_sat(),
            });
        }

        if self.min_staking_time_blocks > self.max_staking_time_blocks {
            return Err(ParamsError::InvalidBounds {
                name: "staking time",
                min: self.min_staking_time_blocks.into(),
                max: self.max_staking_time_blocks.into(),
            });
        }

        Ok(())
    }

    /// Whether the given key belongs to the covenant committee.
    pub fn is_covenant_member(&self, pk: &XOnlyPublicKey) -> bool {
        self.covenant_pks.contains(pk)
    }

    /// Checks the terms of a new delegation against these parameters.
    pub fn check_terms(&self, delegation: &NewDelegation) -> Result<(), TermsViolation> {
        let amount = delegation.staking_amount;
        if amount < self.min_staking_value || amount > self.max_staking_value {
            return Err(TermsViolation::StakingAmount {
                amount,
                min: self.min_staking_value,
                max: self.max_staking_value,
            });
        }

        let time = delegation.staking_time;
        if time < self.min_staking_time_blocks || time > self.max_staking_time_blocks {
            return Err(TermsViolation::StakingTime {
                time,
                min: self.min_staking_time_blocks,
                max: self.max_staking_time_blocks,
            });
        }

        if delegation.unbonding_time < self.min_unbonding_time_blocks {
            return Err(TermsViolation::UnbondingTime {
                time: delegation.unbonding_time,
                min: self.min_unbonding_time_blocks,
            });
        }

        Ok(())
    }
}
