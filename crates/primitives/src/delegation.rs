//! The delegation record that is kept for every observed staking transaction.

use std::collections::{BTreeMap, BTreeSet};

use bitcoin::{secp256k1::schnorr::Signature, Amount, Transaction, Txid, XOnlyPublicKey};
use serde::{Deserialize, Serialize};

use crate::{
    state::{DelegationState, DelegationSubState, SlashedOutput},
    types::{BitcoinBlockHeight, ParamsVersion, TimelockBlocks},
};

/// The data carried by a newly observed staking transaction.
///
/// This is everything needed to create a [`DelegationRecord`] in the
/// [`DelegationState::Pending`] state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDelegation {
    /// The txid of the staking transaction which identifies the delegation.
    pub staking_txid: Txid,

    /// The BTC key of the staker.
    pub staker_pk: XOnlyPublicKey,

    /// The finality providers this stake is delegated to.
    pub finality_provider_pks: BTreeSet<XOnlyPublicKey>,

    /// The amount locked in the staking output.
    pub staking_amount: Amount,

    /// The number of blocks the staking output is timelocked for.
    pub staking_time: TimelockBlocks,

    /// The number of blocks the unbonding output is timelocked for.
    pub unbonding_time: TimelockBlocks,

    /// The version of the staking parameters in effect when the delegation was created.
    pub params_version: ParamsVersion,
}

/// The persisted record of a BTC delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationRecord {
    /// The txid of the staking transaction.
    pub staking_txid: Txid,

    /// The BTC key of the staker.
    pub staker_pk: XOnlyPublicKey,

    /// The finality providers this stake is delegated to, fixed at creation.
    pub finality_provider_pks: BTreeSet<XOnlyPublicKey>,

    /// The amount locked in the staking output.
    pub staking_amount: Amount,

    /// The number of blocks the staking output is timelocked for.
    pub staking_time: TimelockBlocks,

    /// The number of blocks the unbonding output is timelocked for.
    pub unbonding_time: TimelockBlocks,

    /// The staking parameters version this delegation is bound to.
    pub params_version: ParamsVersion,

    /// The current lifecycle state.
    pub state: DelegationState,

    /// Why the current state was reached, if it matters.
    pub sub_state: Option<DelegationSubState>,

    /// The height at which the staking transaction was included, once it is active.
    pub start_height: Option<BitcoinBlockHeight>,

    /// The height at which the currently running timelock expires.
    pub expiry_height: Option<BitcoinBlockHeight>,

    /// The covenant signatures collected so far, keyed by covenant key.
    pub covenant_signatures: BTreeMap<XOnlyPublicKey, Signature>,

    /// The slashing transaction, once the delegation has been slashed.
    pub slashing: Option<SlashingRecord>,
}

/// A slashing transaction observed on the Bitcoin chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashingRecord {
    /// The output the transaction spent.
    pub output: SlashedOutput,

    /// The slashing transaction.
    pub slashing_tx: Transaction,

    /// The height at which the transaction spent the output.
    pub spend_height: BitcoinBlockHeight,
}

impl DelegationRecord {
    /// Creates a record in the [`DelegationState::Pending`] state for a newly observed stake.
    pub fn new_pending(delegation: NewDelegation) -> Self {
        let NewDelegation {
            staking_txid,
            staker_pk,
            finality_provider_pks,
            staking_amount,
            staking_time,
            unbonding_time,
            params_version,
        } = delegation;

        Self {
            staking_txid,
            staker_pk,
            finality_provider_pks,
            staking_amount,
            staking_time,
            unbonding_time,
            params_version,
            state: DelegationState::Pending,
            sub_state: None,
            start_height: None,
            expiry_height: None,
            covenant_signatures: BTreeMap::new(),
            slashing: None,
        }
    }

    /// The number of distinct covenant keys that have signed this delegation.
    pub fn covenant_signature_count(&self) -> usize {
        self.covenant_signatures.len()
    }
}
