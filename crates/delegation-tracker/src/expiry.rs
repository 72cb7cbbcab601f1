//! Sweeps expired timelocks and drives the corresponding delegations to `UNBONDED`.
//!
//! Timelock markers form a durable work queue. A marker is only deleted once its expiry event has
//! been handled, whether the delegation moved or had already moved on. A crash between the two
//! leaves the marker in place and the next scan replays the event, which the engine then rejects
//! as already applied.

use std::sync::Arc;

use staking_db::{
    cursor::CursorDb,
    delegation::DelegationDb,
    timelock::TimeLockDb,
    types::{CursorOutcome, DeleteOutcome},
};
use staking_params::prelude::ParamsProvider;
use staking_primitives::{timelock::TimeLockMarker, types::BitcoinBlockHeight};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    chain::ChainTipSource,
    config::ExpiryCheckerConfig,
    constants::EXPIRY_SCANNER_CURSOR,
    engine::{DelegationEngine, TransitionResult},
    errors::TrackerError,
    event::DelegationEvent,
    poller::Poller,
};

/// Summary of a single expiry scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// The tip height the scan ran at.
    pub tip_height: BitcoinBlockHeight,

    /// The number of due markers fetched.
    pub due: usize,

    /// The number of delegations moved by an expiry.
    pub applied: usize,

    /// The number of expiries the delegation had already moved past.
    pub rejected: usize,

    /// The number of markers removed from the queue.
    pub deleted: usize,

    /// The number of markers left in the queue because handling them failed.
    pub failed: usize,
}

/// Periodically applies the expiry transition to every delegation whose timelock is over.
#[derive(Debug)]
pub struct ExpiryScanner<Db, P> {
    engine: DelegationEngine<Db, P>,
    db: Arc<Db>,
    config: ExpiryCheckerConfig,
}

impl<Db, P> Clone for ExpiryScanner<Db, P> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            db: self.db.clone(),
            config: self.config,
        }
    }
}

impl<Db, P> ExpiryScanner<Db, P>
where
    Db: DelegationDb + TimeLockDb + CursorDb + Send + Sync,
    P: ParamsProvider,
{
    /// Creates a new scanner.
    pub const fn new(
        engine: DelegationEngine<Db, P>,
        db: Arc<Db>,
        config: ExpiryCheckerConfig,
    ) -> Self {
        Self { engine, db, config }
    }

    /// Handles the markers that are due at `tip_height`, a page at a time.
    ///
    /// Failures on individual markers are logged and counted, and their markers stay queued for
    /// the next scan. The scan pages past them and stops after the first full page that had no
    /// failures, or once no due marker is left.
    pub async fn run_expiry_scan(
        &self,
        tip_height: BitcoinBlockHeight,
    ) -> Result<ScanReport, TrackerError> {
        let page_size = self.config.page_size();
        let mut report = ScanReport {
            tip_height,
            ..Default::default()
        };
        let mut after = None;

        loop {
            let markers = self
                .db
                .find_expired_markers(tip_height, after.as_ref(), page_size)
                .await?;

            let failed_before = report.failed;
            report.due += markers.len();
            for marker in &markers {
                self.handle_marker(*marker, &mut report).await;
            }

            match markers.last() {
                Some(last) if markers.len() == page_size && report.failed > failed_before => {
                    debug!(after = ?last, "paging past failed markers");
                    after = Some(*last);
                }
                _ => break,
            }
        }

        if report.due > 0 {
            info!(
                %tip_height,
                due = report.due,
                applied = report.applied,
                rejected = report.rejected,
                failed = report.failed,
                "expiry scan complete"
            );
        }

        Ok(report)
    }

    async fn handle_marker(&self, marker: TimeLockMarker, report: &mut ScanReport) {
        let TimeLockMarker {
            staking_txid,
            sub_state,
            expire_height,
        } = marker;

        let event = DelegationEvent::TimelockExpired {
            staking_txid,
            sub_state,
        };
        match self.engine.apply(event).await {
            Ok(TransitionResult::Applied { .. }) => report.applied += 1,
            Ok(TransitionResult::Rejected { current, .. }) => {
                debug!(%staking_txid, %sub_state, ?current, "expiry already superseded");
                report.rejected += 1;
            }
            Err(e) => {
                warn!(
                    %staking_txid,
                    %sub_state,
                    %expire_height,
                    %e,
                    "could not apply expiry, keeping marker"
                );
                report.failed += 1;
                return;
            }
        }

        match self.db.delete_timelock_marker(&marker).await {
            Ok(DeleteOutcome::Deleted) => report.deleted += 1,
            Ok(DeleteOutcome::NotFound) => {
                debug!(%staking_txid, %sub_state, "marker already removed");
            }
            Err(e) => {
                error!(%staking_txid, %sub_state, %e, "could not delete handled marker");
                report.failed += 1;
            }
        }
    }

    /// Runs one scan at the current tip and records the tip in the scanner cursor.
    ///
    /// The cursor never moves backwards: a tip below the recorded height is still scanned but
    /// leaves the cursor as is.
    pub async fn tick(&self, chain: &impl ChainTipSource) -> Result<ScanReport, TrackerError> {
        let tip_height = chain.current_tip_height().await?;
        let cursor = self.db.get_cursor(EXPIRY_SCANNER_CURSOR).await?;

        if tip_height < cursor.height {
            warn!(%tip_height, cursor = cursor.height, "tip is below the scanned height");
        }

        let report = self.run_expiry_scan(tip_height).await?;

        if tip_height > cursor.height {
            match self
                .db
                .advance_cursor(EXPIRY_SCANNER_CURSOR, cursor.version, tip_height)
                .await?
            {
                CursorOutcome::Advanced(cursor) => {
                    debug!(height = cursor.height, version = cursor.version, "expiry cursor advanced");
                }
                CursorOutcome::Stale(current) => {
                    warn!(
                        expected = cursor.version,
                        found = current.version,
                        height = current.height,
                        "expiry cursor moved concurrently"
                    );
                }
            }
        }

        Ok(report)
    }

    /// Runs [`Self::tick`] at the configured interval until `cancel` is triggered.
    pub async fn run(&self, chain: Arc<impl ChainTipSource>, cancel: CancellationToken) {
        let chain = chain.as_ref();

        Poller::new("expiry-scanner", self.config.interval())
            .run(cancel, || self.tick(chain))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    use async_trait::async_trait;
    use bitcoin::{secp256k1::schnorr::Signature, Txid, XOnlyPublicKey};
    use staking_db::{
        errors::{DbError, DbResult},
        inmemory::{errors::InMemoryError, StakingDbInMemory},
        types::{Cursor, InsertOutcome, SignatureOutcome, StateUpdate, UpdateOutcome},
    };
    use staking_params::prelude::VersionedParams;
    use staking_primitives::{
        delegation::DelegationRecord,
        state::{DelegationState, DelegationSubState},
    };
    use staking_test_utils::prelude::*;

    use super::*;
    use crate::errors::ChainClientError;

    const CONFIRMATION_DEPTH: u64 = 6;

    /// Passes everything through to the in-memory store but can be told to fail marker deletes.
    #[derive(Debug, Default)]
    struct FlakyDeletes {
        inner: StakingDbInMemory,
        fail_deletes: AtomicBool,
    }

    #[async_trait]
    impl DelegationDb for FlakyDeletes {
        async fn get_delegation(&self, staking_txid: Txid) -> DbResult<Option<DelegationRecord>> {
            self.inner.get_delegation(staking_txid).await
        }

        async fn save_new_delegation(
            &self,
            delegation: &DelegationRecord,
        ) -> DbResult<InsertOutcome> {
            self.inner.save_new_delegation(delegation).await
        }

        async fn update_delegation_state(
            &self,
            staking_txid: Txid,
            update: &StateUpdate,
        ) -> DbResult<UpdateOutcome> {
            self.inner.update_delegation_state(staking_txid, update).await
        }

        async fn save_covenant_signature(
            &self,
            staking_txid: Txid,
            covenant_pk: XOnlyPublicKey,
            signature: Signature,
        ) -> DbResult<SignatureOutcome> {
            self.inner
                .save_covenant_signature(staking_txid, covenant_pk, signature)
                .await
        }

        async fn get_delegations_by_states(
            &self,
            states: &[DelegationState],
        ) -> DbResult<Vec<DelegationRecord>> {
            self.inner.get_delegations_by_states(states).await
        }

        async fn get_delegations_by_finality_provider(
            &self,
            finality_provider_pk: XOnlyPublicKey,
        ) -> DbResult<Vec<DelegationRecord>> {
            self.inner
                .get_delegations_by_finality_provider(finality_provider_pk)
                .await
        }
    }

    #[async_trait]
    impl TimeLockDb for FlakyDeletes {
        async fn save_timelock_marker(&self, marker: &TimeLockMarker) -> DbResult<InsertOutcome> {
            self.inner.save_timelock_marker(marker).await
        }

        async fn find_expired_markers(
            &self,
            tip_height: BitcoinBlockHeight,
            after: Option<&TimeLockMarker>,
            limit: usize,
        ) -> DbResult<Vec<TimeLockMarker>> {
            self.inner
                .find_expired_markers(tip_height, after, limit)
                .await
        }

        async fn delete_timelock_marker(
            &self,
            marker: &TimeLockMarker,
        ) -> DbResult<DeleteOutcome> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(DbError::InMemory(InMemoryError::NotFound));
            }

            self.inner.delete_timelock_marker(marker).await
        }
    }

    #[async_trait]
    impl CursorDb for FlakyDeletes {
        async fn get_cursor(&self, name: &str) -> DbResult<Cursor> {
            self.inner.get_cursor(name).await
        }

        async fn advance_cursor(
            &self,
            name: &str,
            expected_version: u64,
            height: BitcoinBlockHeight,
        ) -> DbResult<CursorOutcome> {
            self.inner
                .advance_cursor(name, expected_version, height)
                .await
        }
    }

    #[derive(Debug, Default)]
    struct FixedTip(AtomicU64);

    impl FixedTip {
        fn set(&self, height: BitcoinBlockHeight) {
            self.0.store(height, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ChainTipSource for FixedTip {
        async fn current_tip_height(&self) -> Result<BitcoinBlockHeight, ChainClientError> {
            Ok(self.0.load(Ordering::SeqCst))
        }
    }

    type TestScanner = ExpiryScanner<FlakyDeletes, VersionedParams>;

    fn setup(page_size: usize) -> (TestScanner, Arc<FlakyDeletes>) {
        let params =
            generate_versioned_params(generate_staking_params(0, 3, 2), CONFIRMATION_DEPTH);

        let db = Arc::new(FlakyDeletes::default());
        let engine = DelegationEngine::new(db.clone(), Arc::new(params));
        let config = ExpiryCheckerConfig::default().with_page_size(page_size);

        (ExpiryScanner::new(engine, db.clone(), config), db)
    }

    /// Creates an active delegation whose staking timelock expires at `expire_height`.
    async fn active_delegation(scanner: &TestScanner, expire_height: BitcoinBlockHeight) -> Txid {
        let inclusion_height = expire_height - u64::from(TEST_MIN_STAKING_TIME);
        let delegation = generate_new_delegation_with_times(0, TEST_MIN_STAKING_TIME, 50);
        let staking_txid = delegation.staking_txid;

        for event in [
            DelegationEvent::NewStake(delegation),
            DelegationEvent::InclusionProofConfirmed {
                staking_txid,
                inclusion_height,
                tip_height: inclusion_height + CONFIRMATION_DEPTH,
            },
        ] {
            assert!(scanner
                .engine
                .apply(event)
                .await
                .is_ok_and(|result| result.is_applied()));
        }

        staking_txid
    }

    async fn state_of(db: &FlakyDeletes, staking_txid: Txid) -> DelegationRecord {
        db.get_delegation(staking_txid)
            .await
            .expect("must be able to read")
            .expect("delegation must exist")
    }

    async fn pending_markers(db: &FlakyDeletes) -> Vec<TimeLockMarker> {
        db.find_expired_markers(u64::MAX, None, usize::MAX)
            .await
            .expect("must be able to read markers")
    }

    #[tokio::test]
    async fn test_marker_expires_at_its_height() {
        let (scanner, db) = setup(10);
        let txid = active_delegation(&scanner, 100).await;

        let report = scanner.run_expiry_scan(99).await.expect("must be able to scan");
        assert_eq!(report.due, 0);
        assert_eq!(state_of(&db, txid).await.state, DelegationState::Active);

        let report = scanner.run_expiry_scan(100).await.expect("must be able to scan");
        assert_eq!(
            report,
            ScanReport {
                tip_height: 100,
                due: 1,
                applied: 1,
                deleted: 1,
                ..Default::default()
            }
        );

        let record = state_of(&db, txid).await;
        assert_eq!(record.state, DelegationState::Unbonded);
        assert_eq!(record.sub_state, Some(DelegationSubState::Timelock));

        let report = scanner.run_expiry_scan(150).await.expect("must be able to scan");
        assert_eq!(report.due, 0, "handled marker must not be seen again");
    }

    #[tokio::test]
    async fn test_superseded_marker_is_deleted() {
        let (scanner, db) = setup(10);
        let txid = active_delegation(&scanner, 100).await;

        assert!(scanner
            .engine
            .apply(DelegationEvent::SlashingTxObserved {
                staking_txid: txid,
                slashing_tx: generate_tx(1, 2),
                spend_height: 90,
            })
            .await
            .is_ok_and(|result| result.is_applied()));

        let report = scanner.run_expiry_scan(100).await.expect("must be able to scan");
        assert_eq!((report.rejected, report.deleted), (1, 1));
        assert_eq!(state_of(&db, txid).await.state, DelegationState::Slashed);
        assert!(pending_markers(&db).await.is_empty());
    }

    #[tokio::test]
    async fn test_scan_is_paged_in_height_order() {
        let (scanner, db) = setup(2);

        let mut txids = Vec::new();
        for height in [102, 100, 101] {
            txids.push((height, active_delegation(&scanner, height).await));
        }
        txids.sort();

        let report = scanner.run_expiry_scan(200).await.expect("must be able to scan");
        assert_eq!((report.due, report.applied), (2, 2));

        for (height, txid) in &txids {
            let expected = if *height == 102 {
                DelegationState::Active
            } else {
                DelegationState::Unbonded
            };
            assert_eq!(state_of(&db, *txid).await.state, expected, "height {height}");
        }

        let report = scanner.run_expiry_scan(200).await.expect("must be able to scan");
        assert_eq!((report.due, report.applied), (1, 1));
        assert!(pending_markers(&db).await.is_empty());
    }

    #[tokio::test]
    async fn test_marker_of_unknown_delegation_is_kept() {
        let (scanner, db) = setup(10);
        let txid = active_delegation(&scanner, 100).await;

        let orphan = TimeLockMarker::new(generate_txid(), 50, DelegationSubState::Timelock);
        assert!(db
            .save_timelock_marker(&orphan)
            .await
            .is_ok_and(|outcome| outcome == InsertOutcome::Inserted));

        let report = scanner.run_expiry_scan(100).await.expect("must be able to scan");
        assert_eq!(
            report,
            ScanReport {
                tip_height: 100,
                due: 2,
                applied: 1,
                deleted: 1,
                failed: 1,
                ..Default::default()
            },
            "a failing marker must not block the rest of the scan"
        );

        assert_eq!(state_of(&db, txid).await.state, DelegationState::Unbonded);
        assert_eq!(pending_markers(&db).await, vec![orphan]);
    }

    #[tokio::test]
    async fn test_failing_markers_do_not_starve_the_scan() {
        let (scanner, db) = setup(1);
        let txid = active_delegation(&scanner, 100).await;

        let orphan = TimeLockMarker::new(generate_txid(), 50, DelegationSubState::Timelock);
        db.save_timelock_marker(&orphan)
            .await
            .expect("must be able to save marker");

        let report = scanner.run_expiry_scan(1_000).await.expect("must be able to scan");
        assert_eq!(
            report,
            ScanReport {
                tip_height: 1_000,
                due: 2,
                applied: 1,
                deleted: 1,
                failed: 1,
                ..Default::default()
            },
            "scan must page past a full page of failures"
        );
        assert_eq!(state_of(&db, txid).await.state, DelegationState::Unbonded);

        let report = scanner.run_expiry_scan(1_000).await.expect("must be able to scan");
        assert_eq!((report.due, report.failed), (1, 1));
        assert_eq!(pending_markers(&db).await, vec![orphan]);
    }

    #[tokio::test]
    async fn test_scan_stops_after_first_clean_page() {
        let (scanner, db) = setup(2);

        for height in [10, 20] {
            let orphan = TimeLockMarker::new(generate_txid(), height, DelegationSubState::Timelock);
            db.save_timelock_marker(&orphan)
                .await
                .expect("must be able to save marker");
        }
        let mut txids = Vec::new();
        for height in [100, 101, 102] {
            txids.push(active_delegation(&scanner, height).await);
        }

        let report = scanner.run_expiry_scan(200).await.expect("must be able to scan");
        assert_eq!(
            (report.due, report.applied, report.failed),
            (4, 2, 2),
            "one page of failures and one clean page"
        );
        assert_eq!(state_of(&db, txids[2]).await.state, DelegationState::Active);

        let report = scanner.run_expiry_scan(200).await.expect("must be able to scan");
        assert_eq!((report.due, report.applied, report.failed), (3, 1, 2));
        for txid in txids {
            assert_eq!(state_of(&db, txid).await.state, DelegationState::Unbonded);
        }
        assert_eq!(pending_markers(&db).await.len(), 2);
    }

    #[tokio::test]
    async fn test_interrupted_scan_is_replayed() {
        let (scanner, db) = setup(10);
        let txid = active_delegation(&scanner, 100).await;

        db.fail_deletes.store(true, Ordering::SeqCst);
        let report = scanner.run_expiry_scan(100).await.expect("must be able to scan");
        assert_eq!((report.applied, report.deleted, report.failed), (1, 0, 1));
        assert_eq!(state_of(&db, txid).await.state, DelegationState::Unbonded);
        assert_eq!(pending_markers(&db).await.len(), 1);

        db.fail_deletes.store(false, Ordering::SeqCst);
        let report = scanner.run_expiry_scan(100).await.expect("must be able to scan");
        assert_eq!(
            (report.applied, report.rejected, report.deleted),
            (0, 1, 1),
            "replayed expiry must be rejected and its marker cleaned up"
        );

        let record = state_of(&db, txid).await;
        assert_eq!(record.state, DelegationState::Unbonded);
        assert_eq!(record.sub_state, Some(DelegationSubState::Timelock));
        assert!(pending_markers(&db).await.is_empty());
    }

    #[tokio::test]
    async fn test_tick_never_moves_cursor_backwards() {
        let (scanner, db) = setup(10);
        let txid = active_delegation(&scanner, 100).await;
        let chain = FixedTip::default();

        chain.set(100);
        let report = scanner.tick(&chain).await.expect("must be able to tick");
        assert_eq!(report.applied, 1);
        assert_eq!(state_of(&db, txid).await.state, DelegationState::Unbonded);
        assert_eq!(
            db.get_cursor(EXPIRY_SCANNER_CURSOR).await.ok(),
            Some(Cursor {
                height: 100,
                version: 1
            })
        );

        chain.set(90);
        scanner.tick(&chain).await.expect("must be able to tick");
        assert_eq!(
            db.get_cursor(EXPIRY_SCANNER_CURSOR).await.ok(),
            Some(Cursor {
                height: 100,
                version: 1
            }),
            "lower tip must not rewind the cursor"
        );

        chain.set(120);
        scanner.tick(&chain).await.expect("must be able to tick");
        assert_eq!(
            db.get_cursor(EXPIRY_SCANNER_CURSOR).await.ok(),
            Some(Cursor {
                height: 120,
                version: 2
            })
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let (scanner, db) = setup(10);
        let scanner = ExpiryScanner {
            config: scanner
                .config
                .with_interval(std::time::Duration::from_millis(5)),
            ..scanner
        };
        let txid = active_delegation(&scanner, 100).await;

        let chain = Arc::new(FixedTip::default());
        chain.set(100);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let scanner = scanner.clone();
            let chain = chain.clone();
            let cancel = cancel.clone();
            async move { scanner.run(chain, cancel).await }
        });

        while state_of(&db, txid).await.state != DelegationState::Unbonded {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        cancel.cancel();

        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("scanner must stop after cancellation")
            .expect("scanner must not panic");
    }
}
