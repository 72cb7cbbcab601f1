//! Collection of covenant signatures and detection of the covenant quorum.

use std::sync::Arc;

use bitcoin::{secp256k1::schnorr::Signature, Txid, XOnlyPublicKey};
use staking_db::{delegation::DelegationDb, types::SignatureOutcome};
use staking_params::prelude::{ParamsProvider, StakingParams};
use staking_primitives::delegation::DelegationRecord;
use tracing::{debug, info, warn};

use crate::errors::TrackerError;

/// The result of storing a covenant signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureReceipt {
    /// The number of distinct covenant signatures stored after this one.
    pub total: usize,

    /// The quorum of the params version the delegation is bound to.
    pub quorum: usize,

    /// Whether this signature is the one that made the count reach the quorum.
    ///
    /// Exactly one signature per delegation observes this.
    pub crossed: bool,
}

impl SignatureReceipt {
    /// Whether the stored signatures meet the quorum.
    pub const fn is_reached(&self) -> bool {
        self.total >= self.quorum
    }
}

/// Accumulates covenant signatures per delegation.
#[derive(Debug)]
pub struct CovenantQuorumTracker<Db, P> {
    db: Arc<Db>,
    params: Arc<P>,
}

impl<Db, P> Clone for CovenantQuorumTracker<Db, P> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            params: self.params.clone(),
        }
    }
}

impl<Db, P> CovenantQuorumTracker<Db, P>
where
    Db: DelegationDb + Send + Sync,
    P: ParamsProvider,
{
    /// Creates a new tracker.
    pub const fn new(db: Arc<Db>, params: Arc<P>) -> Self {
        Self { db, params }
    }

    /// Stores the signature of a covenant member over the given delegation.
    ///
    /// The committee and quorum are those of the params version the delegation was created with.
    pub async fn record_signature(
        &self,
        staking_txid: Txid,
        covenant_pk: XOnlyPublicKey,
        signature: Signature,
    ) -> Result<SignatureReceipt, TrackerError> {
        let Some(delegation) = self.db.get_delegation(staking_txid).await? else {
            warn!(%staking_txid, %covenant_pk, "covenant signature for unknown delegation");
            return Err(TrackerError::DelegationNotFound(staking_txid));
        };

        let params = self.bound_params(&delegation)?;

        if !params.is_covenant_member(&covenant_pk) {
            warn!(%staking_txid, %covenant_pk, version = %delegation.params_version, "dropping signature from non-covenant key");
            return Err(TrackerError::UnauthorizedSigner {
                staking_txid,
                covenant_pk,
            });
        }

        let quorum = params.covenant_quorum as usize;
        match self
            .db
            .save_covenant_signature(staking_txid, covenant_pk, signature)
            .await?
        {
            SignatureOutcome::Inserted { total } => {
                let crossed = total == quorum;
                if crossed {
                    info!(%staking_txid, %total, %quorum, "covenant quorum reached");
                } else {
                    debug!(%staking_txid, %covenant_pk, %total, %quorum, "covenant signature stored");
                }

                Ok(SignatureReceipt {
                    total,
                    quorum,
                    crossed,
                })
            }
            SignatureOutcome::AlreadyExists => {
                warn!(%staking_txid, %covenant_pk, "dropping duplicate covenant signature");
                Err(TrackerError::DuplicateSignature {
                    staking_txid,
                    covenant_pk,
                })
            }
        }
    }

    /// Counts the signatures stored for the delegation against its quorum.
    ///
    /// The returned receipt never reports a crossing.
    pub async fn tally(&self, staking_txid: Txid) -> Result<SignatureReceipt, TrackerError> {
        let Some(delegation) = self.db.get_delegation(staking_txid).await? else {
            return Err(TrackerError::DelegationNotFound(staking_txid));
        };

        let params = self.bound_params(&delegation)?;

        Ok(SignatureReceipt {
            total: delegation.covenant_signature_count(),
            quorum: params.covenant_quorum as usize,
            crossed: false,
        })
    }

    fn bound_params(&self, delegation: &DelegationRecord) -> Result<&StakingParams, TrackerError> {
        let version = delegation.params_version;

        self.params
            .staking_params(version)
            .ok_or(TrackerError::UnknownParamsVersion {
                staking_txid: delegation.staking_txid,
                version,
            })
    }
}
