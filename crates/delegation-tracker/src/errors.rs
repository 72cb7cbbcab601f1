//! Error types for the delegation tracker.

use bitcoin::{Txid, XOnlyPublicKey};
use staking_db::errors::DbError;
use staking_params::errors::TermsViolation;
use staking_primitives::types::{BitcoinBlockHeight, ParamsVersion, TimelockBlocks};
use thiserror::Error;

/// Unified error type for everything that can go wrong while handling a delegation event.
///
/// A transition whose precondition does not hold is not an error, see
/// [`TransitionResult::Rejected`](crate::engine::TransitionResult::Rejected).
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The store could not serve the request.
    #[error("store unavailable: {0}")]
    Store(#[from] DbError),

    /// The event refers to a delegation that has not been observed.
    #[error("delegation {0} not found")]
    DelegationNotFound(Txid),

    /// The delegation is bound to a params version that is not registered.
    #[error("unknown params version {version} for delegation {staking_txid}")]
    UnknownParamsVersion {
        /// The delegation.
        staking_txid: Txid,

        /// The unknown version.
        version: ParamsVersion,
    },

    /// The covenant member already has a signature stored for the delegation.
    #[error("covenant {covenant_pk} already signed delegation {staking_txid}")]
    DuplicateSignature {
        /// The delegation.
        staking_txid: Txid,

        /// The covenant key.
        covenant_pk: XOnlyPublicKey,
    },

    /// The signer is not part of the covenant committee bound to the delegation.
    #[error("{covenant_pk} is not a covenant member for delegation {staking_txid}")]
    UnauthorizedSigner {
        /// The delegation.
        staking_txid: Txid,

        /// The offending key.
        covenant_pk: XOnlyPublicKey,
    },

    /// The terms of a new stake violate its staking parameters.
    #[error("invalid staking terms for delegation {staking_txid}: {violation}")]
    InvalidStakingTerms {
        /// The delegation.
        staking_txid: Txid,

        /// The violated bound.
        violation: TermsViolation,
    },

    /// The staking transaction is not yet buried deep enough.
    #[error(
        "delegation {staking_txid} included at {inclusion_height} is not confirmed at tip \
         {tip_height} (depth {required})"
    )]
    InsufficientConfirmations {
        /// The delegation.
        staking_txid: Txid,

        /// The height of the block including the staking transaction.
        inclusion_height: BitcoinBlockHeight,

        /// The tip at which the inclusion was observed.
        tip_height: BitcoinBlockHeight,

        /// The required confirmation depth.
        required: u64,
    },

    /// The expiry of a timelock starting at the height carried by an event does not fit a height.
    #[error(
        "timelock of {blocks} blocks from height {height} overflows for delegation {staking_txid}"
    )]
    HeightOverflow {
        /// The delegation.
        staking_txid: Txid,

        /// The height the timelock starts at.
        height: BitcoinBlockHeight,

        /// The length of the timelock.
        blocks: TimelockBlocks,
    },

    /// The chain client could not serve the request.
    #[error("chain client: {0}")]
    ChainClient(#[from] ChainClientError),
}

impl TrackerError {
    /// Whether the same event may succeed if it is delivered again later.
    ///
    /// Non-transient errors are caused by the input itself, which should be dropped.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            TrackerError::Store(_)
                | TrackerError::ChainClient(_)
                | TrackerError::InsufficientConfirmations { .. }
        )
    }
}

/// Errors that can occur when querying a chain client.
#[derive(Debug, Error)]
pub enum ChainClientError {
    /// The request could not be sent or the node returned an error.
    #[error("rpc: {0}")]
    Rpc(String),

    /// The node returned a response that could not be interpreted.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The client could not be set up from its configuration.
    #[error("invalid client config: {0}")]
    Config(String),
}
