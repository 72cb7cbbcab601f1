//! The delegation lifecycle engine.
//!
//! The engine holds no state of its own. Every event re-reads the delegation from the store,
//! validates the requested transition against the state it just read and writes the result with a
//! precondition on that same state. Concurrent writers therefore race on the precondition: the
//! first one wins and the others observe a rejection.

use std::sync::Arc;

use bitcoin::{secp256k1::schnorr::Signature, Txid, XOnlyPublicKey};
use staking_db::{
    delegation::DelegationDb,
    types::{InsertOutcome, StateUpdate, UpdateOutcome},
};
use staking_params::prelude::ParamsProvider;
use staking_primitives::{
    delegation::{DelegationRecord, NewDelegation, SlashingRecord},
    state::{DelegationState, DelegationSubState, SlashedOutput},
    timelock::TimeLockMarker,
    types::{BitcoinBlockHeight, TimelockBlocks},
};
use tracing::{debug, info, warn};

use crate::{
    errors::TrackerError,
    event::DelegationEvent,
    quorum::{CovenantQuorumTracker, SignatureReceipt},
    transition::{self, TransitionKind},
};

/// The outcome of applying a [`DelegationEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// The event was applied.
    Applied {
        /// The delegation.
        staking_txid: Txid,

        /// The state before the event, `None` if the event created the delegation.
        from: Option<DelegationState>,

        /// The state after the event.
        to: DelegationState,

        /// The substate after the event.
        sub_state: Option<DelegationSubState>,

        /// The timelock scheduled by the event, if any.
        timelock: Option<TimeLockMarker>,
    },

    /// The delegation is not in a state the event can be applied to.
    ///
    /// This is expected for duplicate or out-of-order deliveries and must not be retried as is.
    Rejected {
        /// The delegation.
        staking_txid: Txid,

        /// The rejected transition, `None` for a repeated creation.
        attempted: Option<TransitionKind>,

        /// The state of the delegation as last read.
        current: Option<DelegationState>,
    },
}

impl TransitionResult {
    /// Whether the event was applied.
    pub const fn is_applied(&self) -> bool {
        matches!(self, TransitionResult::Applied { .. })
    }
}

/// The outcome of recording a covenant signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CovenantOutcome {
    /// What the quorum tracker made of the signature.
    pub receipt: SignatureReceipt,

    /// The result of the quorum transition, if this signature triggered it.
    pub transition: Option<TransitionResult>,
}

/// Applies chain events to delegation records.
#[derive(Debug)]
pub struct DelegationEngine<Db, P> {
    db: Arc<Db>,
    params: Arc<P>,
    quorum: CovenantQuorumTracker<Db, P>,
}

impl<Db, P> Clone for DelegationEngine<Db, P> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            params: self.params.clone(),
            quorum: self.quorum.clone(),
        }
    }
}

impl<Db, P> DelegationEngine<Db, P>
where
    Db: DelegationDb + Send + Sync,
    P: ParamsProvider,
{
    /// Creates a new engine on top of the given store and parameters.
    pub fn new(db: Arc<Db>, params: Arc<P>) -> Self {
        let quorum = CovenantQuorumTracker::new(db.clone(), params.clone());

        Self { db, params, quorum }
    }

    /// Applies the event to the delegation it refers to.
    pub async fn apply(&self, event: DelegationEvent) -> Result<TransitionResult, TrackerError> {
        let event = match event {
            DelegationEvent::NewStake(delegation) => {
                return self.create_delegation(delegation).await;
            }
            event => event,
        };

        let staking_txid = event.staking_txid();
        let Some(kind) = event.transition_kind() else {
            return Ok(TransitionResult::Rejected {
                staking_txid,
                attempted: None,
                current: None,
            });
        };

        let Some(delegation) = self.db.get_delegation(staking_txid).await? else {
            warn!(%staking_txid, event = %kind, "event for unknown delegation");
            return Err(TrackerError::DelegationNotFound(staking_txid));
        };

        self.transition(delegation, kind, &event).await
    }

    /// Records the signature of a covenant member and, once the quorum is met, applies the
    /// [`DelegationEvent::CovenantQuorumReached`] transition.
    ///
    /// The signature that crosses the quorum triggers the transition. If the store fails or the
    /// process stops right after that signature is stored, the transition is completed by the next
    /// signature for the delegation or by a redelivery of the same one. A redelivered signature
    /// that completes nothing is reported as [`TrackerError::DuplicateSignature`].
    pub async fn record_covenant_signature(
        &self,
        staking_txid: Txid,
        covenant_pk: XOnlyPublicKey,
        signature: Signature,
    ) -> Result<CovenantOutcome, TrackerError> {
        let receipt = match self
            .quorum
            .record_signature(staking_txid, covenant_pk, signature)
            .await
        {
            Ok(receipt) => receipt,
            Err(duplicate @ TrackerError::DuplicateSignature { .. }) => {
                let receipt = self.quorum.tally(staking_txid).await?;
                if !receipt.is_reached() {
                    return Err(duplicate);
                }

                return match self.complete_quorum_transition(staking_txid).await? {
                    Some(transition) => Ok(CovenantOutcome {
                        receipt,
                        transition: Some(transition),
                    }),
                    None => Err(duplicate),
                };
            }
            Err(e) => return Err(e),
        };

        let transition = if receipt.crossed {
            Some(
                self.apply(DelegationEvent::CovenantQuorumReached { staking_txid })
                    .await?,
            )
        } else if receipt.is_reached() {
            self.complete_quorum_transition(staking_txid).await?
        } else {
            None
        };

        Ok(CovenantOutcome {
            receipt,
            transition,
        })
    }

    /// Applies the quorum transition on behalf of a signature that did not cross the quorum.
    ///
    /// Returns `None` if the delegation already left `PENDING`.
    async fn complete_quorum_transition(
        &self,
        staking_txid: Txid,
    ) -> Result<Option<TransitionResult>, TrackerError> {
        let result = self
            .apply(DelegationEvent::CovenantQuorumReached { staking_txid })
            .await?;

        if !result.is_applied() {
            return Ok(None);
        }

        warn!(%staking_txid, "applied covenant quorum transition missed by an earlier signature");

        Ok(Some(result))
    }

    async fn create_delegation(
        &self,
        delegation: NewDelegation,
    ) -> Result<TransitionResult, TrackerError> {
        let staking_txid = delegation.staking_txid;
        let version = delegation.params_version;

        let params = self.params.staking_params(version).ok_or_else(|| {
            warn!(%staking_txid, %version, "new stake with unknown params version");
            TrackerError::UnknownParamsVersion {
                staking_txid,
                version,
            }
        })?;

        params.check_terms(&delegation).map_err(|violation| {
            warn!(%staking_txid, %violation, "dropping stake with invalid terms");
            TrackerError::InvalidStakingTerms {
                staking_txid,
                violation,
            }
        })?;

        let record = DelegationRecord::new_pending(delegation);
        match self.db.save_new_delegation(&record).await? {
            InsertOutcome::Inserted => {
                info!(%staking_txid, %version, "new delegation");

                Ok(TransitionResult::Applied {
                    staking_txid,
                    from: None,
                    to: DelegationState::Pending,
                    sub_state: None,
                    timelock: None,
                })
            }
            InsertOutcome::AlreadyExists => {
                let current = self
                    .db
                    .get_delegation(staking_txid)
                    .await?
                    .map(|d| d.state);
                debug!(%staking_txid, ?current, "delegation already exists");

                Ok(TransitionResult::Rejected {
                    staking_txid,
                    attempted: None,
                    current,
                })
            }
        }
    }

    async fn transition(
        &self,
        delegation: DelegationRecord,
        kind: TransitionKind,
        event: &DelegationEvent,
    ) -> Result<TransitionResult, TrackerError> {
        let staking_txid = delegation.staking_txid;

        let transition = match transition::validate(delegation.state, kind) {
            Ok(transition) => transition,
            Err(rejection) => {
                debug!(%staking_txid, %rejection, "ignoring event");

                return Ok(TransitionResult::Rejected {
                    staking_txid,
                    attempted: Some(kind),
                    current: Some(delegation.state),
                });
            }
        };

        let mut update =
            StateUpdate::new([transition.from], transition.to).with_sub_state(transition.sub_state);

        match *event {
            DelegationEvent::InclusionProofConfirmed {
                inclusion_height,
                tip_height,
                ..
            } => {
                let checkpoint = self.params.checkpoint_params();
                if !checkpoint.is_confirmed(inclusion_height, tip_height) {
                    debug!(%staking_txid, %inclusion_height, %tip_height, "inclusion not yet confirmed");

                    return Err(TrackerError::InsufficientConfirmations {
                        staking_txid,
                        inclusion_height,
                        tip_height,
                        required: checkpoint.btc_confirmation_depth,
                    });
                }

                let expire_height =
                    expiry_height(staking_txid, inclusion_height, delegation.staking_time)?;
                update = update
                    .with_start_height(inclusion_height)
                    .with_timelock(TimeLockMarker::new(
                        staking_txid,
                        expire_height,
                        DelegationSubState::Timelock,
                    ));
            }
            DelegationEvent::UnbondingTxObserved {
                observed_height, ..
            } => {
                let expire_height =
                    expiry_height(staking_txid, observed_height, delegation.unbonding_time)?;
                update = update.with_timelock(TimeLockMarker::new(
                    staking_txid,
                    expire_height,
                    DelegationSubState::EarlyUnbonding,
                ));
            }
            DelegationEvent::SlashingTxObserved {
                ref slashing_tx,
                spend_height,
                ..
            } => {
                let output = match transition.from {
                    DelegationState::Unbonding => SlashedOutput::Unbonding,
                    _ => SlashedOutput::Staking,
                };
                update = update.with_slashing(SlashingRecord {
                    output,
                    slashing_tx: slashing_tx.clone(),
                    spend_height,
                });
            }
            _ => {}
        }

        match self.db.update_delegation_state(staking_txid, &update).await? {
            UpdateOutcome::Applied => {
                info!(%staking_txid, from = %transition.from, to = %transition.to, event = %kind, "delegation transitioned");

                Ok(TransitionResult::Applied {
                    staking_txid,
                    from: Some(transition.from),
                    to: transition.to,
                    sub_state: transition.sub_state.or(delegation.sub_state),
                    timelock: update.timelock,
                })
            }
            UpdateOutcome::PreconditionFailed => {
                let current = self
                    .db
                    .get_delegation(staking_txid)
                    .await?
                    .map(|d| d.state);
                debug!(%staking_txid, event = %kind, read = %transition.from, ?current, "lost race for delegation");

                Ok(TransitionResult::Rejected {
                    staking_txid,
                    attempted: Some(kind),
                    current,
                })
            }
        }
    }
}

/// The height at which a timelock of `blocks` starting at `height` expires.
fn expiry_height(
    staking_txid: Txid,
    height: BitcoinBlockHeight,
    blocks: TimelockBlocks,
) -> Result<BitcoinBlockHeight, TrackerError> {
    height
        .checked_add(u64::from(blocks))
        .ok_or(TrackerError::HeightOverflow {
            staking_txid,
            height,
            blocks,
        })
}
