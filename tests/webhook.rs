//! Webhook reconciliation tests: signature gate, idempotency, conflicting
//! terminal reports, and the notification side-effect boundary.

mod common;

use common::*;

use rusqlite::Connection;
use tutorbase::error::AppError;
use tutorbase::notify;
use tutorbase::reconcile::{reconcile, ReconcileOutcome};

/// Mirror of the webhook handler: reconcile, then dispatch notifications
/// only when the delivery freshly moved the transaction into PAID. Push is
/// disabled so no async runtime is involved.
fn deliver(conn: &mut Connection, note: &GatewayNotification) -> tutorbase::error::Result<ReconcileOutcome> {
    let gateway = test_gateway();
    let outcome = reconcile(&gateway, conn, note)?;

    if let ReconcileOutcome::Applied {
        became_paid: true,
        booking,
        ..
    } = &outcome
    {
        let student = queries::get_user_by_id(conn, &booking.student_id)
            .expect("query")
            .expect("student exists");
        let teacher = queries::get_user_by_id(conn, &booking.teacher_id)
            .expect("query")
            .expect("teacher exists");
        notify::dispatch_payment_confirmed(
            conn,
            &reqwest::Client::new(),
            &None,
            booking,
            &student,
            &teacher,
        );
    }

    Ok(outcome)
}

#[test]
fn test_settlement_marks_paid_and_confirms_booking() {
    let mut conn = setup_test_db();
    let fx = setup_payment_fixture(&conn, "order-settle-1");

    let note = signed_note("order-settle-1", "settlement", Some("accept"), "100000.00");
    let outcome = deliver(&mut conn, &note).expect("reconcile succeeds");

    match outcome {
        ReconcileOutcome::Applied {
            transaction,
            booking,
            became_paid,
        } => {
            assert!(became_paid);
            assert_eq!(transaction.status, TransactionStatus::Paid);
            assert_eq!(booking.status, BookingStatus::Confirmed);
        }
        other => panic!("Expected Applied, got {:?}", other),
    }

    // Persisted state matches the returned snapshots.
    let txn = queries::get_transaction_by_id(&conn, &fx.transaction.id)
        .expect("query")
        .expect("transaction exists");
    assert_eq!(txn.status, TransactionStatus::Paid);
    let booking = queries::get_booking_by_id(&conn, &fx.booking.id)
        .expect("query")
        .expect("booking exists");
    assert_eq!(booking.status, BookingStatus::Confirmed);
}

#[test]
fn test_duplicate_settlement_is_noop_with_single_notification_pair() {
    let mut conn = setup_test_db();
    let fx = setup_payment_fixture(&conn, "order-dup-1");

    let note = signed_note("order-dup-1", "settlement", Some("accept"), "100000.00");

    let first = deliver(&mut conn, &note).expect("first delivery");
    assert!(matches!(first, ReconcileOutcome::Applied { became_paid: true, .. }));

    let second = deliver(&mut conn, &note).expect("second delivery");
    assert!(matches!(second, ReconcileOutcome::Duplicate));

    // Still paid and confirmed.
    let txn = queries::get_transaction_by_id(&conn, &fx.transaction.id)
        .expect("query")
        .expect("transaction exists");
    assert_eq!(txn.status, TransactionStatus::Paid);
    let booking = queries::get_booking_by_id(&conn, &fx.booking.id)
        .expect("query")
        .expect("booking exists");
    assert_eq!(booking.status, BookingStatus::Confirmed);

    // Exactly one notification each, not two.
    assert_eq!(
        queries::count_notifications_for_user(&conn, &fx.student.id).expect("count"),
        1
    );
    assert_eq!(
        queries::count_notifications_for_user(&conn, &fx.teacher.id).expect("count"),
        1
    );
}

#[test]
fn test_expire_cancels_booking_without_notifications() {
    let mut conn = setup_test_db();
    let fx = setup_payment_fixture(&conn, "order-expire-1");

    let note = signed_note("order-expire-1", "expire", None, "100000.00");
    let outcome = deliver(&mut conn, &note).expect("reconcile succeeds");

    match outcome {
        ReconcileOutcome::Applied {
            transaction,
            booking,
            became_paid,
        } => {
            assert!(!became_paid);
            assert_eq!(transaction.status, TransactionStatus::Expired);
            assert_eq!(booking.status, BookingStatus::Cancelled);
        }
        other => panic!("Expected Applied, got {:?}", other),
    }

    assert_eq!(
        queries::count_notifications_for_user(&conn, &fx.student.id).expect("count"),
        0
    );
    assert_eq!(
        queries::count_notifications_for_user(&conn, &fx.teacher.id).expect("count"),
        0
    );
}

#[test]
fn test_bad_signature_rejected_without_state_change() {
    let mut conn = setup_test_db();
    let fx = setup_payment_fixture(&conn, "order-forged-1");

    let mut note = signed_note("order-forged-1", "settlement", Some("accept"), "100000.00");
    note.signature_key = "deadbeef".repeat(16);

    let err = deliver(&mut conn, &note).expect_err("forged payload must be rejected");
    assert!(matches!(err, AppError::InvalidSignature));

    let txn = queries::get_transaction_by_id(&conn, &fx.transaction.id)
        .expect("query")
        .expect("transaction exists");
    assert_eq!(txn.status, TransactionStatus::Pending);
    let booking = queries::get_booking_by_id(&conn, &fx.booking.id)
        .expect("query")
        .expect("booking exists");
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(
        queries::count_notifications_for_user(&conn, &fx.student.id).expect("count"),
        0
    );
}

#[test]
fn test_signature_checked_before_lookup() {
    let mut conn = setup_test_db();
    setup_payment_fixture(&conn, "order-known-1");

    // Unknown order AND bad signature: the signature gate must answer, not
    // the database lookup.
    let mut note = signed_note("order-unknown-1", "settlement", Some("accept"), "100000.00");
    note.signature_key = "00".repeat(64);

    let err = deliver(&mut conn, &note).expect_err("must be rejected");
    assert!(matches!(err, AppError::InvalidSignature));
}

#[test]
fn test_unknown_order_with_valid_signature_is_not_found() {
    let mut conn = setup_test_db();
    setup_payment_fixture(&conn, "order-known-2");

    let note = signed_note("order-unknown-2", "settlement", Some("accept"), "100000.00");
    let err = deliver(&mut conn, &note).expect_err("unknown reference must be rejected");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn test_conflicting_terminal_report_keeps_first_outcome() {
    let mut conn = setup_test_db();
    let fx = setup_payment_fixture(&conn, "order-conflict-1");

    let settle = signed_note("order-conflict-1", "settlement", Some("accept"), "100000.00");
    deliver(&mut conn, &settle).expect("first delivery");

    let deny = signed_note("order-conflict-1", "deny", None, "100000.00");
    let outcome = deliver(&mut conn, &deny).expect("conflicting delivery is acked");

    match outcome {
        ReconcileOutcome::ConflictIgnored { stored, reported } => {
            assert_eq!(stored, TransactionStatus::Paid);
            assert_eq!(reported, TransactionStatus::Failed);
        }
        other => panic!("Expected ConflictIgnored, got {:?}", other),
    }

    // Stored outcome untouched, no extra notifications.
    let txn = queries::get_transaction_by_id(&conn, &fx.transaction.id)
        .expect("query")
        .expect("transaction exists");
    assert_eq!(txn.status, TransactionStatus::Paid);
    let booking = queries::get_booking_by_id(&conn, &fx.booking.id)
        .expect("query")
        .expect("booking exists");
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(
        queries::count_notifications_for_user(&conn, &fx.student.id).expect("count"),
        1
    );
}

#[test]
fn test_fraud_flagged_capture_fails_transaction() {
    let mut conn = setup_test_db();
    let fx = setup_payment_fixture(&conn, "order-fraud-1");

    let note = signed_note("order-fraud-1", "capture", Some("challenge"), "100000.00");
    let outcome = deliver(&mut conn, &note).expect("reconcile succeeds");

    match outcome {
        ReconcileOutcome::Applied {
            transaction,
            booking,
            became_paid,
        } => {
            assert!(!became_paid);
            assert_eq!(transaction.status, TransactionStatus::Failed);
            assert_eq!(booking.status, BookingStatus::Cancelled);
        }
        other => panic!("Expected Applied, got {:?}", other),
    }

    assert_eq!(
        queries::count_notifications_for_user(&conn, &fx.student.id).expect("count"),
        0
    );
}

#[test]
fn test_pending_report_changes_nothing() {
    let mut conn = setup_test_db();
    let fx = setup_payment_fixture(&conn, "order-pending-1");

    let note = signed_note("order-pending-1", "pending", None, "100000.00");
    let outcome = deliver(&mut conn, &note).expect("reconcile succeeds");
    assert!(matches!(outcome, ReconcileOutcome::StillPending));

    let txn = queries::get_transaction_by_id(&conn, &fx.transaction.id)
        .expect("query")
        .expect("transaction exists");
    assert_eq!(txn.status, TransactionStatus::Pending);
    let booking = queries::get_booking_by_id(&conn, &fx.booking.id)
        .expect("query")
        .expect("booking exists");
    assert_eq!(booking.status, BookingStatus::Pending);
}

#[test]
fn test_unrecognized_gateway_status_fails_transaction() {
    let mut conn = setup_test_db();
    setup_payment_fixture(&conn, "order-other-1");

    let note = signed_note("order-other-1", "refund_chargeback", None, "100000.00");
    let outcome = deliver(&mut conn, &note).expect("reconcile succeeds");

    match outcome {
        ReconcileOutcome::Applied {
            transaction,
            booking,
            became_paid,
        } => {
            assert!(!became_paid);
            assert_eq!(transaction.status, TransactionStatus::Failed);
            assert_eq!(booking.status, BookingStatus::Cancelled);
        }
        other => panic!("Expected Applied, got {:?}", other),
    }
}

#[test]
fn test_settlement_after_cancellation_keeps_booking_cancelled() {
    let mut conn = setup_test_db();
    let fx = setup_payment_fixture(&conn, "order-late-settle-1");

    // The student cancels while the payment is still in flight.
    assert!(queries::cancel_booking(&conn, &fx.booking.id).expect("cancel"));

    let note = signed_note("order-late-settle-1", "settlement", Some("accept"), "100000.00");
    let outcome = deliver(&mut conn, &note).expect("reconcile succeeds");

    match outcome {
        ReconcileOutcome::BookingClosed {
            transaction,
            booking,
        } => {
            // The money arrived and is recorded; the booking stays closed.
            assert_eq!(transaction.status, TransactionStatus::Paid);
            assert_eq!(booking.status, BookingStatus::Cancelled);
        }
        other => panic!("Expected BookingClosed, got {:?}", other),
    }

    let booking = queries::get_booking_by_id(&conn, &fx.booking.id)
        .expect("query")
        .expect("booking exists");
    assert_eq!(booking.status, BookingStatus::Cancelled);
    let txn = queries::get_transaction_by_id(&conn, &fx.transaction.id)
        .expect("query")
        .expect("transaction exists");
    assert_eq!(txn.status, TransactionStatus::Paid);

    // Nobody is told their cancelled session is confirmed.
    assert_eq!(
        queries::count_notifications_for_user(&conn, &fx.student.id).expect("count"),
        0
    );
    assert_eq!(
        queries::count_notifications_for_user(&conn, &fx.teacher.id).expect("count"),
        0
    );
}

#[test]
fn test_settle_cas_refuses_non_pending_row() {
    let mut conn = setup_test_db();
    let fx = setup_payment_fixture(&conn, "order-cas-1");

    let settled = queries::settle_transaction(
        &mut conn,
        &fx.transaction.id,
        &fx.booking.id,
        TransactionStatus::Paid,
        BookingStatus::Confirmed,
    )
    .expect("first settle");
    assert_eq!(settled, queries::SettleResult::Applied);

    // Row is no longer pending; the compare-and-swap must not touch it.
    let settled_again = queries::settle_transaction(
        &mut conn,
        &fx.transaction.id,
        &fx.booking.id,
        TransactionStatus::Failed,
        BookingStatus::Cancelled,
    )
    .expect("second settle");
    assert_eq!(settled_again, queries::SettleResult::TransactionNotPending);

    let txn = queries::get_transaction_by_id(&conn, &fx.transaction.id)
        .expect("query")
        .expect("transaction exists");
    assert_eq!(txn.status, TransactionStatus::Paid);
    let booking = queries::get_booking_by_id(&conn, &fx.booking.id)
        .expect("query")
        .expect("booking exists");
    assert_eq!(booking.status, BookingStatus::Confirmed);
}

#[test]
fn test_notification_pair_content() {
    let conn = setup_test_db();
    let fx = setup_payment_fixture(&conn, "order-notif-1");

    let (to_student, to_teacher) =
        notify::payment_confirmed_notifications(&fx.booking, &fx.student, &fx.teacher);

    assert_eq!(to_student.user_id, fx.student.id);
    assert_eq!(to_student.kind, notify::KIND_PAYMENT_CONFIRMED);
    assert_eq!(to_teacher.user_id, fx.teacher.id);
    assert_eq!(to_teacher.kind, notify::KIND_BOOKING_CONFIRMED);
    assert!(to_teacher.body.contains(&fx.student.name));

    let payload: serde_json::Value =
        serde_json::from_str(to_student.payload.as_deref().expect("payload set"))
            .expect("payload is JSON");
    assert_eq!(payload["booking_id"], fx.booking.id);
    assert_eq!(payload["amount"], fx.booking.total_price);
}
