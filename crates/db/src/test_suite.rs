//! Behavior shared by every storage backend, run against each of them.

use staking_primitives::{
    delegation::SlashingRecord,
    state::{DelegationState, DelegationSubState, SlashedOutput},
    timelock::TimeLockMarker,
};
use staking_test_utils::prelude::*;

use crate::{
    cursor::CursorDb,
    delegation::DelegationDb,
    timelock::TimeLockDb,
    types::{
        Cursor, CursorOutcome, DeleteOutcome, InsertOutcome, SignatureOutcome, StateUpdate,
        UpdateOutcome,
    },
};

pub(crate) async fn delegation_db(db: &(impl DelegationDb + TimeLockDb)) {
    let delegation = generate_pending_delegation(0);
    let txid = delegation.staking_txid;

    assert!(
        db.get_delegation(txid).await.is_ok_and(|d| d.is_none()),
        "delegation must not exist initially"
    );
    assert!(
        db.save_new_delegation(&delegation)
            .await
            .is_ok_and(|outcome| outcome == InsertOutcome::Inserted),
        "first insert must succeed"
    );
    assert!(
        db.save_new_delegation(&delegation)
            .await
            .is_ok_and(|outcome| outcome == InsertOutcome::AlreadyExists),
        "second insert must be reported as a duplicate"
    );
    assert!(
        db.get_delegation(txid)
            .await
            .is_ok_and(|d| d.as_ref() == Some(&delegation)),
        "stored delegation must match the saved one"
    );

    let verify = StateUpdate::new([DelegationState::Pending], DelegationState::Verified);
    assert!(
        db.update_delegation_state(generate_txid(), &verify)
            .await
            .is_ok_and(|outcome| outcome == UpdateOutcome::PreconditionFailed),
        "update of a missing delegation must fail its precondition"
    );
    assert!(
        db.update_delegation_state(txid, &verify)
            .await
            .is_ok_and(|outcome| outcome == UpdateOutcome::Applied),
        "update from the current state must apply"
    );
    assert!(
        db.update_delegation_state(txid, &verify)
            .await
            .is_ok_and(|outcome| outcome == UpdateOutcome::PreconditionFailed),
        "replayed update must fail its precondition"
    );

    let marker = TimeLockMarker::new(
        txid,
        1_000 + u64::from(delegation.staking_time),
        DelegationSubState::Timelock,
    );
    let activate = StateUpdate::new([DelegationState::Verified], DelegationState::Active)
        .with_start_height(1_000)
        .with_timelock(marker);
    db.update_delegation_state(txid, &activate)
        .await
        .expect("must be able to activate");

    let stored = db
        .get_delegation(txid)
        .await
        .expect("must be able to read")
        .expect("delegation must exist");
    assert_eq!(stored.state, DelegationState::Active);
    assert_eq!(stored.start_height, Some(1_000));
    assert_eq!(stored.expiry_height, Some(marker.expire_height));
    assert_eq!(stored.sub_state, None, "substate must be unchanged");
    assert!(
        db.find_expired_markers(marker.expire_height, None, 10)
            .await
            .is_ok_and(|markers| markers == vec![marker]),
        "marker must be created with the transition"
    );

    let expire = StateUpdate::new([DelegationState::Active], DelegationState::Unbonded)
        .with_sub_state(Some(DelegationSubState::Timelock));
    db.update_delegation_state(txid, &expire)
        .await
        .expect("must be able to expire");

    let other = generate_pending_delegation(1);
    db.save_new_delegation(&other)
        .await
        .expect("must be able to save another delegation");

    let unbonded = db
        .get_delegations_by_states(&[DelegationState::Unbonded])
        .await
        .expect("must be able to query by state");
    assert_eq!(unbonded.len(), 1);
    assert_eq!(unbonded[0].staking_txid, txid);
    assert_eq!(unbonded[0].sub_state, Some(DelegationSubState::Timelock));

    let all = db
        .get_delegations_by_states(&[DelegationState::Unbonded, DelegationState::Pending])
        .await
        .expect("must be able to query by states");
    assert_eq!(all.len(), 2);
    assert!(
        db.get_delegations_by_states(&[])
            .await
            .is_ok_and(|d| d.is_empty()),
        "no states must match no delegations"
    );

    let slashing = SlashingRecord {
        output: SlashedOutput::Staking,
        slashing_tx: generate_tx(1, 2),
        spend_height: 1_500,
    };
    let slash = StateUpdate::new([DelegationState::Verified], DelegationState::Slashed)
        .with_slashing(slashing.clone());
    assert!(
        db.update_delegation_state(other.staking_txid, &slash)
            .await
            .is_ok_and(|outcome| outcome == UpdateOutcome::PreconditionFailed),
        "slashing must not be recorded when the precondition fails"
    );
    assert!(
        db.get_delegation(other.staking_txid)
            .await
            .is_ok_and(|d| d.is_some_and(|d| d.slashing.is_none())),
        "failed update must leave the delegation untouched"
    );

    let slash = StateUpdate::new([DelegationState::Pending], DelegationState::Slashed)
        .with_slashing(slashing.clone());
    db.update_delegation_state(other.staking_txid, &slash)
        .await
        .expect("must be able to slash");
    assert!(
        db.get_delegation(other.staking_txid)
            .await
            .is_ok_and(|d| d.is_some_and(|d| d.slashing == Some(slashing))),
        "slashing transaction must be stored with the transition"
    );
}

pub(crate) async fn delegations_by_finality_provider(db: &impl DelegationDb) {
    let shared_fp = generate_xonly_pubkey();

    let mut first = generate_pending_delegation(0);
    first.finality_provider_pks.insert(shared_fp);
    let mut second = generate_pending_delegation(0);
    second.finality_provider_pks.insert(shared_fp);
    let unrelated = generate_pending_delegation(0);

    for delegation in [&first, &second, &unrelated] {
        db.save_new_delegation(delegation)
            .await
            .expect("must be able to save delegation");
    }
    db.save_covenant_signature(first.staking_txid, generate_xonly_pubkey(), generate_signature())
        .await
        .expect("must be able to save signature");

    let mut found = db
        .get_delegations_by_finality_provider(shared_fp)
        .await
        .expect("must be able to query by finality provider");
    found.sort_by_key(|d| d.staking_txid);

    let mut expected = vec![first.staking_txid, second.staking_txid];
    expected.sort();
    assert_eq!(
        found.iter().map(|d| d.staking_txid).collect::<Vec<_>>(),
        expected
    );
    assert_eq!(
        found
            .iter()
            .map(|d| d.covenant_signature_count())
            .sum::<usize>(),
        1,
        "records must come with their signatures"
    );

    assert!(
        db.get_delegations_by_finality_provider(generate_xonly_pubkey())
            .await
            .is_ok_and(|d| d.is_empty()),
        "unknown finality provider must match no delegations"
    );
}

pub(crate) async fn covenant_signatures(db: &impl DelegationDb) {
    let delegation = generate_pending_delegation(0);
    let txid = delegation.staking_txid;
    db.save_new_delegation(&delegation)
        .await
        .expect("must be able to save delegation");

    let covenant_pks = generate_xonly_pubkeys(3);
    let signatures = std::iter::repeat_with(generate_signature)
        .take(3)
        .collect::<Vec<_>>();

    for (i, (pk, sig)) in covenant_pks.iter().zip(&signatures).enumerate() {
        assert!(
            db.save_covenant_signature(txid, *pk, *sig)
                .await
                .is_ok_and(|outcome| outcome == SignatureOutcome::Inserted { total: i + 1 }),
            "signature {i} must be counted"
        );
    }

    assert!(
        db.save_covenant_signature(txid, covenant_pks[0], generate_signature())
            .await
            .is_ok_and(|outcome| outcome == SignatureOutcome::AlreadyExists),
        "second signature from the same key must be rejected"
    );

    let stored = db
        .get_delegation(txid)
        .await
        .expect("must be able to read")
        .expect("delegation must exist");
    assert_eq!(stored.covenant_signature_count(), 3);
    assert_eq!(
        stored.covenant_signatures.get(&covenant_pks[0]),
        Some(&signatures[0]),
        "first signature must never be overwritten"
    );
}

pub(crate) async fn timelock_db(db: &impl TimeLockDb) {
    let (a, b, c) = (generate_txid(), generate_txid(), generate_txid());
    let markers = [
        TimeLockMarker::new(a, 120, DelegationSubState::Timelock),
        TimeLockMarker::new(b, 100, DelegationSubState::EarlyUnbonding),
        TimeLockMarker::new(c, 100, DelegationSubState::Timelock),
        TimeLockMarker::new(a, 200, DelegationSubState::EarlyUnbonding),
    ];

    for marker in &markers {
        assert!(
            db.save_timelock_marker(marker)
                .await
                .is_ok_and(|outcome| outcome == InsertOutcome::Inserted),
            "marker must be inserted"
        );
    }
    assert!(
        db.save_timelock_marker(&markers[0])
            .await
            .is_ok_and(|outcome| outcome == InsertOutcome::AlreadyExists),
        "duplicate marker must not be inserted"
    );

    let mut expected = markers[..3].to_vec();
    expected.sort();

    assert!(
        db.find_expired_markers(99, None, 10)
            .await
            .is_ok_and(|m| m.is_empty()),
        "no marker must be due below the lowest height"
    );
    assert!(
        db.find_expired_markers(150, None, 10)
            .await
            .is_ok_and(|m| m == expected),
        "due markers must be ordered by height then txid"
    );
    assert!(
        db.find_expired_markers(150, None, 2)
            .await
            .is_ok_and(|m| m == expected[..2]),
        "limit must cap the result"
    );
    assert!(
        db.find_expired_markers(150, Some(&expected[0]), 10)
            .await
            .is_ok_and(|m| m == expected[1..]),
        "paging must resume strictly after the given marker"
    );
    assert!(
        db.find_expired_markers(150, Some(&expected[2]), 10)
            .await
            .is_ok_and(|m| m.is_empty()),
        "paging past the last due marker must find nothing"
    );

    assert!(
        db.delete_timelock_marker(&expected[0])
            .await
            .is_ok_and(|outcome| outcome == DeleteOutcome::Deleted),
        "due marker must be deleted"
    );
    assert!(
        db.delete_timelock_marker(&expected[0])
            .await
            .is_ok_and(|outcome| outcome == DeleteOutcome::NotFound),
        "deleting twice must report a missing marker"
    );

    let other_sub_state = TimeLockMarker::new(
        expected[1].staking_txid,
        expected[1].expire_height,
        match expected[1].sub_state {
            DelegationSubState::Timelock => DelegationSubState::EarlyUnbonding,
            DelegationSubState::EarlyUnbonding => DelegationSubState::Timelock,
        },
    );
    assert!(
        db.delete_timelock_marker(&other_sub_state)
            .await
            .is_ok_and(|outcome| outcome == DeleteOutcome::NotFound),
        "deletion must match the full marker key"
    );
    assert!(
        db.find_expired_markers(150, None, 10)
            .await
            .is_ok_and(|m| m == expected[1..]),
        "remaining markers must be left in place"
    );
}

pub(crate) async fn cursor_db(db: &impl CursorDb) {
    let name = "btc_expiry_scanner";

    assert!(
        db.get_cursor(name)
            .await
            .is_ok_and(|c| c == Cursor::default()),
        "cursor must start at its default"
    );

    let first = Cursor {
        height: 100,
        version: 1,
    };
    assert!(
        db.advance_cursor(name, 0, 100)
            .await
            .is_ok_and(|outcome| outcome == CursorOutcome::Advanced(first)),
        "first advance must succeed"
    );
    assert!(
        db.advance_cursor(name, 0, 150)
            .await
            .is_ok_and(|outcome| outcome == CursorOutcome::Stale(first)),
        "advance from a stale version must be refused"
    );
    assert!(
        db.advance_cursor(name, 1, 150)
            .await
            .is_ok_and(|outcome| outcome
                == CursorOutcome::Advanced(Cursor {
                    height: 150,
                    version: 2
                })),
        "advance from the current version must succeed"
    );
    assert!(
        db.get_cursor("other")
            .await
            .is_ok_and(|c| c == Cursor::default()),
        "cursors must be independent"
    );
}
