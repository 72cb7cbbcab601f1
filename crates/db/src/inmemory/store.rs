//! In-memory database for delegations, timelock markers and cursors.

use std::{
    collections::{BTreeSet, HashMap},
    ops::Bound,
    sync::Arc,
};

use async_trait::async_trait;
use bitcoin::{secp256k1::schnorr::Signature, Txid, XOnlyPublicKey};
use staking_primitives::{
    delegation::DelegationRecord, state::DelegationState, timelock::TimeLockMarker,
    types::BitcoinBlockHeight,
};
use tokio::sync::RwLock;
use tracing::trace;

use super::errors::InMemoryError;
use crate::{
    cursor::CursorDb,
    delegation::DelegationDb,
    errors::DbResult,
    timelock::TimeLockDb,
    types::{
        Cursor, CursorOutcome, DeleteOutcome, InsertOutcome, SignatureOutcome, StateUpdate,
        UpdateOutcome,
    },
};

/// In-memory database for the staking indexer.
///
/// Whenever both tables are needed, `delegations` is locked before `timelocks`.
#[derive(Debug, Clone, Default)]
pub struct StakingDbInMemory {
    /// staking_txid -> delegation
    delegations: Arc<RwLock<HashMap<Txid, DelegationRecord>>>,

    /// Pending markers, ordered by height then txid.
    timelocks: Arc<RwLock<BTreeSet<TimeLockMarker>>>,

    /// cursor name -> cursor
    cursors: Arc<RwLock<HashMap<String, Cursor>>>,
}

#[async_trait]
impl DelegationDb for StakingDbInMemory {
    async fn get_delegation(&self, staking_txid: Txid) -> DbResult<Option<DelegationRecord>> {
        Ok(self.delegations.read().await.get(&staking_txid).cloned())
    }

    async fn save_new_delegation(&self, delegation: &DelegationRecord) -> DbResult<InsertOutcome> {
        let mut delegations = self.delegations.write().await;

        if delegations.contains_key(&delegation.staking_txid) {
            return Ok(InsertOutcome::AlreadyExists);
        }

        delegations.insert(delegation.staking_txid, delegation.clone());

        Ok(InsertOutcome::Inserted)
    }

    async fn update_delegation_state(
        &self,
        staking_txid: Txid,
        update: &StateUpdate,
    ) -> DbResult<UpdateOutcome> {
        let mut delegations = self.delegations.write().await;

        let Some(record) = delegations.get_mut(&staking_txid) else {
            return Ok(UpdateOutcome::PreconditionFailed);
        };

        if !update.from_states.contains(&record.state) {
            trace!(%staking_txid, current = %record.state, "precondition failed");
            return Ok(UpdateOutcome::PreconditionFailed);
        }

        record.state = update.to_state;
        if let Some(sub_state) = update.to_sub_state {
            record.sub_state = Some(sub_state);
        }
        if let Some(start_height) = update.start_height {
            record.start_height = Some(start_height);
        }
        if let Some(slashing) = &update.slashing {
            record.slashing = Some(slashing.clone());
        }
        if let Some(marker) = update.timelock {
            record.expiry_height = Some(marker.expire_height);
            self.timelocks.write().await.insert(marker);
        }

        Ok(UpdateOutcome::Applied)
    }

    async fn save_covenant_signature(
        &self,
        staking_txid: Txid,
        covenant_pk: XOnlyPublicKey,
        signature: Signature,
    ) -> DbResult<SignatureOutcome> {
        let mut delegations = self.delegations.write().await;

        let record = delegations
            .get_mut(&staking_txid)
            .ok_or(InMemoryError::NotFound)?;

        if record.covenant_signatures.contains_key(&covenant_pk) {
            return Ok(SignatureOutcome::AlreadyExists);
        }

        record.covenant_signatures.insert(covenant_pk, signature);

        Ok(SignatureOutcome::Inserted {
            total: record.covenant_signatures.len(),
        })
    }

    async fn get_delegations_by_states(
        &self,
        states: &[DelegationState],
    ) -> DbResult<Vec<DelegationRecord>> {
        Ok(self
            .delegations
            .read()
            .await
            .values()
            .filter(|record| states.contains(&record.state))
            .cloned()
            .collect())
    }

    async fn get_delegations_by_finality_provider(
        &self,
        finality_provider_pk: XOnlyPublicKey,
    ) -> DbResult<Vec<DelegationRecord>> {
        Ok(self
            .delegations
            .read()
            .await
            .values()
            .filter(|record| record.finality_provider_pks.contains(&finality_provider_pk))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TimeLockDb for StakingDbInMemory {
    async fn save_timelock_marker(&self, marker: &TimeLockMarker) -> DbResult<InsertOutcome> {
        if self.timelocks.write().await.insert(*marker) {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::AlreadyExists)
        }
    }

    async fn find_expired_markers(
        &self,
        tip_height: BitcoinBlockHeight,
        after: Option<&TimeLockMarker>,
        limit: usize,
    ) -> DbResult<Vec<TimeLockMarker>> {
        let start = after.map_or(Bound::Unbounded, Bound::Excluded);

        Ok(self
            .timelocks
            .read()
            .await
            .range((start, Bound::Unbounded))
            .take_while(|marker| marker.is_due(tip_height))
            .take(limit)
            .copied()
            .collect())
    }

    async fn delete_timelock_marker(&self, marker: &TimeLockMarker) -> DbResult<DeleteOutcome> {
        if self.timelocks.write().await.remove(marker) {
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::NotFound)
        }
    }
}

#[async_trait]
impl CursorDb for StakingDbInMemory {
    async fn get_cursor(&self, name: &str) -> DbResult<Cursor> {
        Ok(self
            .cursors
            .read()
            .await
            .get(name)
            .copied()
            .unwrap_or_default())
    }

    async fn advance_cursor(
        &self,
        name: &str,
        expected_version: u64,
        height: BitcoinBlockHeight,
    ) -> DbResult<CursorOutcome> {
        let mut cursors = self.cursors.write().await;
        let current = cursors.get(name).copied().unwrap_or_default();

        if current.version != expected_version {
            return Ok(CursorOutcome::Stale(current));
        }

        let advanced = Cursor {
            height,
            version: current.version + 1,
        };
        cursors.insert(name.to_string(), advanced);

        Ok(CursorOutcome::Advanced(advanced))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_suite;

    #[tokio::test]
    async fn test_delegation_db() {
        test_suite::delegation_db(&StakingDbInMemory::default()).await;
    }

    #[tokio::test]
    async fn test_delegations_by_finality_provider() {
        test_suite::delegations_by_finality_provider(&StakingDbInMemory::default()).await;
    }

    #[tokio::test]
    async fn test_covenant_signatures() {
        test_suite::covenant_signatures(&StakingDbInMemory::default()).await;
    }

    #[tokio::test]
    async fn test_timelock_db() {
        test_suite::timelock_db(&StakingDbInMemory::default()).await;
    }

    #[tokio::test]
    async fn test_cursor_db() {
        test_suite::cursor_db(&StakingDbInMemory::default()).await;
    }

    #[tokio::test]
    async fn test_signature_for_unknown_delegation() {
        let db = StakingDbInMemory::default();
        let (pk, sig) = (
            staking_test_utils::bitcoin::generate_xonly_pubkey(),
            staking_test_utils::bitcoin::generate_signature(),
        );

        let result = db
            .save_covenant_signature(staking_test_utils::bitcoin::generate_txid(), pk, sig)
            .await;
        assert!(
            matches!(
                result,
                Err(crate::errors::DbError::InMemory(InMemoryError::NotFound))
            ),
            "signature for an unknown delegation must not be stored"
        );
    }
}
