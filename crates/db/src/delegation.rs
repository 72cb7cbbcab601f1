//! Interface to the authoritative delegation records.

use async_trait::async_trait;
use bitcoin::{secp256k1::schnorr::Signature, Txid, XOnlyPublicKey};
use staking_primitives::{delegation::DelegationRecord, state::DelegationState};

use crate::{
    errors::DbResult,
    types::{InsertOutcome, SignatureOutcome, StateUpdate, UpdateOutcome},
};

/// Interface to read and conditionally mutate delegation records.
///
/// Implementations must apply each method as a single atomic operation. No method may hold any
/// lock beyond the delegation it operates on.
#[async_trait]
pub trait DelegationDb {
    /// Gets, if present, the [`DelegationRecord`] for the given staking txid.
    async fn get_delegation(&self, staking_txid: Txid) -> DbResult<Option<DelegationRecord>>;

    /// Saves a newly observed delegation. An existing record with the same staking txid is left
    /// untouched.
    async fn save_new_delegation(&self, delegation: &DelegationRecord) -> DbResult<InsertOutcome>;

    /// Applies the [`StateUpdate`] if, and only if, the delegation is currently in one of its
    /// `from_states`.
    ///
    /// A missing delegation is reported as [`UpdateOutcome::PreconditionFailed`].
    async fn update_delegation_state(
        &self,
        staking_txid: Txid,
        update: &StateUpdate,
    ) -> DbResult<UpdateOutcome>;

    /// Stores the covenant signature for the given delegation and returns the number of distinct
    /// covenant signatures stored afterwards. Signatures are never overwritten.
    ///
    /// The insert and the count are atomic with respect to other inserts for the same delegation
    /// so that exactly one caller observes each total.
    async fn save_covenant_signature(
        &self,
        staking_txid: Txid,
        covenant_pk: XOnlyPublicKey,
        signature: Signature,
    ) -> DbResult<SignatureOutcome>;

    /// Gets all the delegations that are in any of the given states.
    async fn get_delegations_by_states(
        &self,
        states: &[DelegationState],
    ) -> DbResult<Vec<DelegationRecord>>;

    /// Gets all the delegations that delegate to the given finality provider.
    async fn get_delegations_by_finality_provider(
        &self,
        finality_provider_pk: XOnlyPublicKey,
    ) -> DbResult<Vec<DelegationRecord>>;
}
