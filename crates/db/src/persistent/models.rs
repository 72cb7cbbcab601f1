//! This module contains the models for the database tables.
//!
//! These models rely on some common types in [`super::types`] module.

use std::collections::BTreeSet;

use bitcoin::XOnlyPublicKey;
use sqlx::types::Json;
use staking_primitives::types::{ParamsVersion, TimelockBlocks};

use super::types::{
    DbAmount, DbDelegationState, DbHeight, DbSignature, DbSlashedOutput, DbSubState,
    DbTransaction, DbTxid, DbXOnlyPublicKey,
};

/// The model for a delegation record, without its covenant signatures.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct Delegation {
    /// The hex-serialized staking txid stored as `TEXT`.
    pub(super) staking_txid: DbTxid,

    /// The staker's key stored as `TEXT`.
    pub(super) staker_pk: DbXOnlyPublicKey,

    /// The finality provider keys stored as a JSON array.
    pub(super) finality_provider_pks: Json<BTreeSet<XOnlyPublicKey>>,

    /// The staked amount in sats stored as `INTEGER`.
    pub(super) staking_amount: DbAmount,

    pub(super) staking_time: TimelockBlocks,

    pub(super) unbonding_time: TimelockBlocks,

    pub(super) params_version: ParamsVersion,

    /// The lifecycle state stored as `TEXT`.
    pub(super) state: DbDelegationState,

    pub(super) sub_state: Option<DbSubState>,

    pub(super) start_height: Option<DbHeight>,

    pub(super) expiry_height: Option<DbHeight>,

    /// The output spent by the slashing transaction, set together with the two columns below.
    pub(super) slashing_output: Option<DbSlashedOutput>,

    /// The consensus-encoded slashing transaction stored as hex `TEXT`.
    pub(super) slashing_tx: Option<DbTransaction>,

    pub(super) slashing_height: Option<DbHeight>,
}

/// The model for a covenant signature over a delegation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct CovenantSignature {
    /// The staking txid of the delegation being signed.
    pub(super) staking_txid: DbTxid,

    /// The key of the covenant member that produced the signature.
    pub(super) covenant_pk: DbXOnlyPublicKey,

    /// The schnorr signature stored as hex `TEXT`.
    pub(super) signature: DbSignature,
}

/// The model for a pending timelock expiry.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct TimeLockMarker {
    pub(super) expire_height: DbHeight,

    pub(super) staking_txid: DbTxid,

    pub(super) sub_state: DbSubState,
}

/// The model for a named progress cursor.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(super) struct Cursor {
    pub(super) height: DbHeight,

    /// The number of times the cursor has been advanced.
    pub(super) version: i64,
}
