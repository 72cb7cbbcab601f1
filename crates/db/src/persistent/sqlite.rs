//! SQLite implementation of the persistent storage layer.

use std::{collections::BTreeMap, future::Future};

use async_trait::async_trait;
use bitcoin::{secp256k1::schnorr::Signature, Txid, XOnlyPublicKey};
use sqlx::{types::Json, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use staking_primitives::{
    delegation::{DelegationRecord, SlashingRecord},
    state::{DelegationState, DelegationSubState},
    timelock::TimeLockMarker,
    types::BitcoinBlockHeight,
};
use tracing::{trace, warn};

use super::{
    config::DbConfig,
    errors::StorageError,
    models,
    types::{
        DbAmount, DbDelegationState, DbHeight, DbSignature, DbSlashedOutput, DbSubState,
        DbTransaction, DbTxid, DbXOnlyPublicKey,
    },
};
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

const DELEGATION_COLUMNS: &str = "staking_txid, staker_pk, finality_provider_pks, staking_amount, \
     staking_time, unbonding_time, params_version, state, sub_state, start_height, expiry_height, \
     slashing_output, slashing_tx, slashing_height";

/// Sorts the substates of markers with the same height and txid the same way as their [`Ord`].
const SUB_STATE_RANK: &str = "CASE sub_state WHEN 'TIMELOCK' THEN 0 ELSE 1 END";

/// Delegation store backed by a SQLite connection pool.
///
/// Operations that fail because the database is busy or locked are retried as per [`DbConfig`].
#[derive(Debug, Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
    config: DbConfig,
}

impl SqliteDb {
    /// Creates a new [`SqliteDb`] on top of an existing pool.
    pub fn new(pool: SqlitePool, config: DbConfig) -> Self {
        Self { pool, config }
    }

    /// Applies all pending schema migrations.
    pub async fn migrate(&self) -> DbResult<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Driver(e.into()))?;

        Ok(())
    }

    async fn execute_with_retries<T, F, Fut>(&self, mut operation: F) -> DbResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, StorageError>> + Send,
        T: Send,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_transient() && attempt < self.config.max_retry_count() => {
                    attempt += 1;
                    warn!(%err, %attempt, "transient database error, retrying");

                    tokio::time::sleep(self.config.backoff_period()).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn fetch_delegation(
        &self,
        staking_txid: Txid,
    ) -> Result<Option<DelegationRecord>, StorageError> {
        let mut tx = self.pool.begin().await?;
        let db_txid = DbTxid::from(staking_txid);

        let delegation = sqlx::query_as::<_, models::Delegation>(&format!(
            "SELECT {DELEGATION_COLUMNS} FROM delegations WHERE staking_txid = $1"
        ))
        .bind(db_txid)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(delegation) = delegation else {
            return Ok(None);
        };

        let signatures = sqlx::query_as::<_, models::CovenantSignature>(
            "SELECT staking_txid, covenant_pk, signature FROM covenant_signatures
                WHERE staking_txid = $1",
        )
        .bind(db_txid)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(into_record(delegation, signatures)))
    }

    async fn insert_delegation(
        &self,
        delegation: &DelegationRecord,
    ) -> Result<InsertOutcome, StorageError> {
        let mut tx = self.pool.begin().await?;
        let db_txid = DbTxid::from(delegation.staking_txid);

        let inserted = sqlx::query(&format!(
            "INSERT OR IGNORE INTO delegations ({DELEGATION_COLUMNS})
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(db_txid)
        .bind(DbXOnlyPublicKey::from(delegation.staker_pk))
        .bind(Json(&delegation.finality_provider_pks))
        .bind(DbAmount::from(delegation.staking_amount))
        .bind(delegation.staking_time)
        .bind(delegation.unbonding_time)
        .bind(delegation.params_version)
        .bind(DbDelegationState::from(delegation.state))
        .bind(delegation.sub_state.map(DbSubState::from))
        .bind(delegation.start_height.map(DbHeight::from))
        .bind(delegation.expiry_height.map(DbHeight::from))
        .bind(delegation.slashing.as_ref().map(|s| DbSlashedOutput::from(s.output)))
        .bind(
            delegation
                .slashing
                .as_ref()
                .map(|s| DbTransaction::from(s.slashing_tx.clone())),
        )
        .bind(delegation.slashing.as_ref().map(|s| DbHeight::from(s.spend_height)))
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if !inserted {
            return Ok(InsertOutcome::AlreadyExists);
        }

        for (covenant_pk, signature) in &delegation.covenant_signatures {
            insert_signature(&mut tx, db_txid, *covenant_pk, *signature).await?;
        }

        tx.commit().await?;

        Ok(InsertOutcome::Inserted)
    }

    async fn apply_state_update(
        &self,
        staking_txid: Txid,
        update: &StateUpdate,
    ) -> Result<UpdateOutcome, StorageError> {
        if update.from_states.is_empty() {
            return Ok(UpdateOutcome::PreconditionFailed);
        }

        let mut tx = self.pool.begin().await?;
        let db_txid = DbTxid::from(staking_txid);

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE delegations SET state = ");
        query
            .push_bind(DbDelegationState::from(update.to_state))
            .push(", sub_state = COALESCE(")
            .push_bind(update.to_sub_state.map(DbSubState::from))
            .push(", sub_state), start_height = COALESCE(")
            .push_bind(update.start_height.map(DbHeight::from))
            .push(", start_height), expiry_height = COALESCE(")
            .push_bind(update.timelock.map(|m| DbHeight::from(m.expire_height)))
            .push(", expiry_height), slashing_output = COALESCE(")
            .push_bind(update.slashing.as_ref().map(|s| DbSlashedOutput::from(s.output)))
            .push(", slashing_output), slashing_tx = COALESCE(")
            .push_bind(
                update
                    .slashing
                    .as_ref()
                    .map(|s| DbTransaction::from(s.slashing_tx.clone())),
            )
            .push(", slashing_tx), slashing_height = COALESCE(")
            .push_bind(update.slashing.as_ref().map(|s| DbHeight::from(s.spend_height)))
            .push(", slashing_height) WHERE staking_txid = ")
            .push_bind(db_txid)
            .push(" AND state IN (");

        let mut states = query.separated(", ");
        for state in &update.from_states {
            states.push_bind(DbDelegationState::from(*state));
        }
        states.push_unseparated(")");

        let applied = query.build().execute(&mut *tx).await?.rows_affected() == 1;
        if !applied {
            trace!(%staking_txid, "precondition failed");
            return Ok(UpdateOutcome::PreconditionFailed);
        }

        if let Some(marker) = &update.timelock {
            insert_marker(&mut tx, marker).await?;
        }

        tx.commit().await?;

        Ok(UpdateOutcome::Applied)
    }

    async fn insert_covenant_signature(
        &self,
        staking_txid: Txid,
        covenant_pk: XOnlyPublicKey,
        signature: Signature,
    ) -> Result<SignatureOutcome, StorageError> {
        let mut tx = self.pool.begin().await?;
        let db_txid = DbTxid::from(staking_txid);

        let exists = sqlx::query("SELECT 1 FROM delegations WHERE staking_txid = $1")
            .bind(db_txid)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !exists {
            return Err(StorageError::InvalidData(format!(
                "no delegation with staking txid {staking_txid}"
            )));
        }

        if !insert_signature(&mut tx, db_txid, covenant_pk, signature).await? {
            return Ok(SignatureOutcome::AlreadyExists);
        }

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM covenant_signatures WHERE staking_txid = $1")
                .bind(db_txid)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        let total = usize::try_from(total)
            .map_err(|e| StorageError::MismatchedTypes(format!("signature count: {e}")))?;

        Ok(SignatureOutcome::Inserted { total })
    }

    async fn fetch_delegations_by_states(
        &self,
        states: &[DelegationState],
    ) -> Result<Vec<DelegationRecord>, StorageError> {
        if states.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {DELEGATION_COLUMNS} FROM delegations WHERE state IN ("
        ));
        push_states(&mut query, states);
        let delegations = query
            .build_query_as::<models::Delegation>()
            .fetch_all(&mut *tx)
            .await?;

        let records = with_signatures(&mut tx, delegations).await?;
        tx.commit().await?;

        Ok(records)
    }

    async fn fetch_delegations_by_finality_provider(
        &self,
        finality_provider_pk: XOnlyPublicKey,
    ) -> Result<Vec<DelegationRecord>, StorageError> {
        let mut tx = self.pool.begin().await?;

        let delegations = sqlx::query_as::<_, models::Delegation>(&format!(
            "SELECT {DELEGATION_COLUMNS} FROM delegations
                WHERE EXISTS (
                    SELECT 1 FROM json_each(delegations.finality_provider_pks)
                        WHERE json_each.value = $1
                )"
        ))
        .bind(DbXOnlyPublicKey::from(finality_provider_pk))
        .fetch_all(&mut *tx)
        .await?;

        let records = with_signatures(&mut tx, delegations).await?;
        tx.commit().await?;

        Ok(records)
    }

    async fn insert_timelock_marker(
        &self,
        marker: &TimeLockMarker,
    ) -> Result<InsertOutcome, StorageError> {
        let mut conn = self.pool.acquire().await?;

        Ok(if insert_marker(&mut conn, marker).await? {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::AlreadyExists
        })
    }

    async fn fetch_expired_markers(
        &self,
        tip_height: BitcoinBlockHeight,
        after: Option<&TimeLockMarker>,
        limit: usize,
    ) -> Result<Vec<TimeLockMarker>, StorageError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT expire_height, staking_txid, sub_state FROM timelock_markers
                WHERE expire_height <= ",
        );
        query.push_bind(DbHeight::from(tip_height));

        if let Some(after) = after {
            let rank = match after.sub_state {
                DelegationSubState::Timelock => 0,
                DelegationSubState::EarlyUnbonding => 1,
            };

            query
                .push(format!(" AND (expire_height, staking_txid, {SUB_STATE_RANK}) > ("))
                .push_bind(DbHeight::from(after.expire_height))
                .push(", ")
                .push_bind(DbTxid::from(after.staking_txid))
                .push(", ")
                .push_bind(rank)
                .push(")");
        }

        query
            .push(format!(
                " ORDER BY expire_height, staking_txid, {SUB_STATE_RANK} LIMIT "
            ))
            .push_bind(limit);

        let markers = query
            .build_query_as::<models::TimeLockMarker>()
            .fetch_all(&self.pool)
            .await?;

        Ok(markers
            .into_iter()
            .map(|m| TimeLockMarker::new(*m.staking_txid, *m.expire_height, *m.sub_state))
            .collect())
    }

    async fn remove_marker(&self, marker: &TimeLockMarker) -> Result<DeleteOutcome, StorageError> {
        let deleted = sqlx::query(
            "DELETE FROM timelock_markers
                WHERE expire_height = $1 AND staking_txid = $2 AND sub_state = $3",
        )
        .bind(DbHeight::from(marker.expire_height))
        .bind(DbTxid::from(marker.staking_txid))
        .bind(DbSubState::from(marker.sub_state))
        .execute(&self.pool)
        .await?
        .rows_affected()
            == 1;

        Ok(if deleted {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::NotFound
        })
    }

    async fn fetch_cursor(
        conn: &mut SqliteConnection,
        name: &str,
    ) -> Result<Cursor, StorageError> {
        let cursor = sqlx::query_as::<_, models::Cursor>(
            "SELECT height, version FROM cursors WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(conn)
        .await?;

        cursor
            .map(|c| -> Result<Cursor, StorageError> {
                let version = u64::try_from(c.version)
                    .map_err(|e| StorageError::MismatchedTypes(format!("cursor version: {e}")))?;
                Ok(Cursor {
                    height: *c.height,
                    version,
                })
            })
            .transpose()
            .map(Option::unwrap_or_default)
    }

    async fn read_cursor(&self, name: &str) -> Result<Cursor, StorageError> {
        let mut conn = self.pool.acquire().await?;

        Self::fetch_cursor(&mut conn, name).await
    }

    async fn compare_and_swap_cursor(
        &self,
        name: &str,
        expected_version: u64,
        height: BitcoinBlockHeight,
    ) -> Result<CursorOutcome, StorageError> {
        let mut tx = self.pool.begin().await?;
        let next_version = expected_version + 1;

        let result = if expected_version == 0 {
            sqlx::query("INSERT OR IGNORE INTO cursors (name, height, version) VALUES ($1, $2, 1)")
                .bind(name)
                .bind(DbHeight::from(height))
                .execute(&mut *tx)
                .await?
        } else {
            sqlx::query(
                "UPDATE cursors SET height = $1, version = version + 1
                    WHERE name = $2 AND version = $3",
            )
            .bind(DbHeight::from(height))
            .bind(name)
            .bind(expected_version as i64)
            .execute(&mut *tx)
            .await?
        };

        if result.rows_affected() != 1 {
            let current = Self::fetch_cursor(&mut tx, name).await?;
            return Ok(CursorOutcome::Stale(current));
        }

        tx.commit().await?;

        Ok(CursorOutcome::Advanced(Cursor {
            height,
            version: next_version,
        }))
    }
}

fn into_record(
    delegation: models::Delegation,
    signatures: Vec<models::CovenantSignature>,
) -> DelegationRecord {
    DelegationRecord {
        staking_txid: *delegation.staking_txid,
        staker_pk: *delegation.staker_pk,
        finality_provider_pks: delegation.finality_provider_pks.0,
        staking_amount: *delegation.staking_amount,
        staking_time: delegation.staking_time,
        unbonding_time: delegation.unbonding_time,
        params_version: delegation.params_version,
        state: *delegation.state,
        sub_state: delegation.sub_state.map(|s| *s),
        start_height: delegation.start_height.map(|h| *h),
        expiry_height: delegation.expiry_height.map(|h| *h),
        covenant_signatures: signatures
            .into_iter()
            .map(|s| (*s.covenant_pk, *s.signature))
            .collect(),
        slashing: match (
            delegation.slashing_output,
            delegation.slashing_tx,
            delegation.slashing_height,
        ) {
            (Some(output), Some(slashing_tx), Some(spend_height)) => Some(SlashingRecord {
                output: *output,
                slashing_tx: slashing_tx.into_inner(),
                spend_height: *spend_height,
            }),
            _ => None,
        },
    }
}

/// Loads the covenant signatures of the given delegations and assembles the records.
async fn with_signatures(
    conn: &mut SqliteConnection,
    delegations: Vec<models::Delegation>,
) -> Result<Vec<DelegationRecord>, StorageError> {
    if delegations.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT staking_txid, covenant_pk, signature FROM covenant_signatures
            WHERE staking_txid IN (",
    );
    let mut txids = query.separated(", ");
    for delegation in &delegations {
        txids.push_bind(delegation.staking_txid);
    }
    txids.push_unseparated(")");

    let signatures = query
        .build_query_as::<models::CovenantSignature>()
        .fetch_all(conn)
        .await?;

    let mut signatures_by_txid: BTreeMap<Txid, Vec<models::CovenantSignature>> = BTreeMap::new();
    for signature in signatures {
        signatures_by_txid
            .entry(*signature.staking_txid)
            .or_default()
            .push(signature);
    }

    Ok(delegations
        .into_iter()
        .map(|delegation| {
            let signatures = signatures_by_txid
                .remove(&*delegation.staking_txid)
                .unwrap_or_default();
            into_record(delegation, signatures)
        })
        .collect())
}

fn push_states(query: &mut QueryBuilder<'_, Sqlite>, states: &[DelegationState]) {
    let mut separated = query.separated(", ");
    for state in states {
        separated.push_bind(DbDelegationState::from(*state));
    }
    separated.push_unseparated(")");
}

/// Inserts the signature unless one already exists for the key. Returns whether it was inserted.
async fn insert_signature(
    conn: &mut SqliteConnection,
    staking_txid: DbTxid,
    covenant_pk: XOnlyPublicKey,
    signature: Signature,
) -> Result<bool, StorageError> {
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO covenant_signatures (staking_txid, covenant_pk, signature)
            VALUES ($1, $2, $3)",
    )
    .bind(staking_txid)
    .bind(DbXOnlyPublicKey::from(covenant_pk))
    .bind(DbSignature::from(signature))
    .execute(conn)
    .await?
    .rows_affected()
        == 1;

    Ok(inserted)
}

async fn insert_marker(
    conn: &mut SqliteConnection,
    marker: &TimeLockMarker,
) -> Result<bool, StorageError> {
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO timelock_markers (expire_height, staking_txid, sub_state)
            VALUES ($1, $2, $3)",
    )
    .bind(DbHeight::from(marker.expire_height))
    .bind(DbTxid::from(marker.staking_txid))
    .bind(DbSubState::from(marker.sub_state))
    .execute(conn)
    .await?
    .rows_affected()
        == 1;

    Ok(inserted)
}

#[async_trait]
impl DelegationDb for SqliteDb {
    async fn get_delegation(&self, staking_txid: Txid) -> DbResult<Option<DelegationRecord>> {
        self.execute_with_retries(|| self.fetch_delegation(staking_txid))
            .await
    }

    async fn save_new_delegation(&self, delegation: &DelegationRecord) -> DbResult<InsertOutcome> {
        self.execute_with_retries(|| self.insert_delegation(delegation))
            .await
    }

    async fn update_delegation_state(
        &self,
        staking_txid: Txid,
        update: &StateUpdate,
    ) -> DbResult<UpdateOutcome> {
        self.execute_with_retries(|| self.apply_state_update(staking_txid, update))
            .await
    }

    async fn save_covenant_signature(
        &self,
        staking_txid: Txid,
        covenant_pk: XOnlyPublicKey,
        signature: Signature,
    ) -> DbResult<SignatureOutcome> {
        self.execute_with_retries(|| {
            self.insert_covenant_signature(staking_txid, covenant_pk, signature)
        })
        .await
    }

    async fn get_delegations_by_states(
        &self,
        states: &[DelegationState],
    ) -> DbResult<Vec<DelegationRecord>> {
        self.execute_with_retries(|| self.fetch_delegations_by_states(states))
            .await
    }

    async fn get_delegations_by_finality_provider(
        &self,
        finality_provider_pk: XOnlyPublicKey,
    ) -> DbResult<Vec<DelegationRecord>> {
        self.execute_with_retries(|| {
            self.fetch_delegations_by_finality_provider(finality_provider_pk)
        })
        .await
    }
}

#[async_trait]
impl TimeLockDb for SqliteDb {
    async fn save_timelock_marker(&self, marker: &TimeLockMarker) -> DbResult<InsertOutcome> {
        self.execute_with_retries(|| self.insert_timelock_marker(marker))
            .await
    }

    async fn find_expired_markers(
        &self,
        tip_height: BitcoinBlockHeight,
        after: Option<&TimeLockMarker>,
        limit: usize,
    ) -> DbResult<Vec<TimeLockMarker>> {
        self.execute_with_retries(|| self.fetch_expired_markers(tip_height, after, limit))
            .await
    }

    async fn delete_timelock_marker(&self, marker: &TimeLockMarker) -> DbResult<DeleteOutcome> {
        self.execute_with_retries(|| self.remove_marker(marker))
            .await
    }
}

#[async_trait]
impl CursorDb for SqliteDb {
    async fn get_cursor(&self, name: &str) -> DbResult<Cursor> {
        self.execute_with_retries(|| self.read_cursor(name)).await
    }

    async fn advance_cursor(
        &self,
        name: &str,
        expected_version: u64,
        height: BitcoinBlockHeight,
    ) -> DbResult<CursorOutcome> {
        self.execute_with_retries(|| self.compare_and_swap_cursor(name, expected_version, height))
            .await
    }
}
