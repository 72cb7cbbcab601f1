//! Module to generate delegations and staking parameters for testing.

use std::collections::BTreeSet;

use bitcoin::{
    key::rand::{rngs::OsRng, Rng},
    Amount, XOnlyPublicKey,
};
use staking_params::prelude::{CheckpointParams, StakingParams, VersionedParams};
use staking_primitives::{
    delegation::{DelegationRecord, NewDelegation},
    types::ParamsVersion,
};

use crate::bitcoin::{generate_txid, generate_xonly_pubkey, generate_xonly_pubkeys};

/// Minimum amount accepted by [`generate_staking_params`].
pub const TEST_MIN_STAKING_VALUE: Amount = Amount::from_sat(10_000);

/// Maximum amount accepted by [`generate_staking_params`].
pub const TEST_MAX_STAKING_VALUE: Amount = Amount::from_sat(100_000_000);

/// Minimum staking time accepted by [`generate_staking_params`].
pub const TEST_MIN_STAKING_TIME: u32 = 100;

/// Maximum staking time accepted by [`generate_staking_params`].
pub const TEST_MAX_STAKING_TIME: u32 = 64_000;

/// Minimum unbonding time accepted by [`generate_staking_params`].
pub const TEST_MIN_UNBONDING_TIME: u32 = 10;

/// Generates staking parameters with a fresh covenant committee of `committee_size` members and
/// the given `quorum`.
pub fn generate_staking_params(
    version: ParamsVersion,
    committee_size: usize,
    quorum: u32,
) -> StakingParams {
    StakingParams {
        version,
        covenant_pks: generate_xonly_pubkeys(committee_size),
        covenant_quorum: quorum,
        min_staking_value: TEST_MIN_STAKING_VALUE,
        max_staking_value: TEST_MAX_STAKING_VALUE,
        min_staking_time_blocks: TEST_MIN_STAKING_TIME,
        max_staking_time_blocks: TEST_MAX_STAKING_TIME,
        min_unbonding_time_blocks: TEST_MIN_UNBONDING_TIME,
    }
}

/// Generates a registry holding only the given staking parameters.
pub fn generate_versioned_params(
    staking: StakingParams,
    btc_confirmation_depth: u64,
) -> VersionedParams {
    let checkpoint = CheckpointParams {
        btc_confirmation_depth,
        ..CheckpointParams::default()
    };

    VersionedParams::new(checkpoint)
        .with_staking_params(staking)
        .expect("generated staking params must be valid")
}

/// Generates a new delegation within the bounds of [`generate_staking_params`].
pub fn generate_new_delegation(params_version: ParamsVersion) -> NewDelegation {
    generate_new_delegation_with_times(
        params_version,
        OsRng.gen_range(TEST_MIN_STAKING_TIME..=TEST_MAX_STAKING_TIME),
        OsRng.gen_range(TEST_MIN_UNBONDING_TIME..=TEST_MIN_UNBONDING_TIME * 10),
    )
}

/// Generates a new delegation with fixed staking and unbonding times.
pub fn generate_new_delegation_with_times(
    params_version: ParamsVersion,
    staking_time: u32,
    unbonding_time: u32,
) -> NewDelegation {
    let finality_provider_pks: BTreeSet<XOnlyPublicKey> =
        std::iter::repeat_with(generate_xonly_pubkey).take(2).collect();
    let staking_amount = Amount::from_sat(
        OsRng.gen_range(TEST_MIN_STAKING_VALUE.to_sat()..=TEST_MAX_STAKING_VALUE.to_sat()),
    );

    NewDelegation {
        staking_txid: generate_txid(),
        staker_pk: generate_xonly_pubkey(),
        finality_provider_pks,
        staking_amount,
        staking_time,
        unbonding_time,
        params_version,
    }
}

/// Generates a [`DelegationRecord`] in the pending state.
pub fn generate_pending_delegation(params_version: ParamsVersion) -> DelegationRecord {
    DelegationRecord::new_pending(generate_new_delegation(params_version))
}
