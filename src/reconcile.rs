//! Webhook reconciliation: the booking x transaction state machine.
//!
//! The gateway reports payment outcomes through asynchronous callbacks that
//! may be replayed, arrive out of order, or arrive concurrently. This module
//! verifies callback authenticity, maps the gateway status vocabulary onto
//! the internal one, and applies the transition atomically. Side effects
//! (notifications) are NOT dispatched here - the caller inspects the
//! [`ReconcileOutcome`] and fires them only on a fresh transition into PAID,
//! keeping the transactional core separate from the best-effort boundary.

use rusqlite::Connection;
use serde::{Deserialize, Deserializer};

use crate::db::queries::{self, SettleResult};
use crate::error::{msg, AppError, Result};
use crate::models::{Booking, BookingStatus, Transaction, TransactionStatus};
use crate::payments::SignatureVerifier;

/// Inbound callback payload from the gateway.
///
/// Transport-layer unauthenticated; authenticity is established entirely by
/// `signature_key`.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayNotification {
    /// External order reference - the idempotency key.
    pub order_id: String,
    pub transaction_status: GatewayTransactionStatus,
    #[serde(default)]
    pub fraud_status: Option<FraudStatus>,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
}

/// Gateway status vocabulary as a closed sum type.
///
/// Anything the gateway may send in the future that we do not recognize
/// lands in `Other` and is routed to the FAILED branch, so the mapping
/// below stays exhaustive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayTransactionStatus {
    Capture,
    Settlement,
    Pending,
    Deny,
    Cancel,
    Expire,
    Other(String),
}

impl From<&str> for GatewayTransactionStatus {
    fn from(s: &str) -> Self {
        match s {
            "capture" => Self::Capture,
            "settlement" => Self::Settlement,
            "pending" => Self::Pending,
            "deny" => Self::Deny,
            "cancel" => Self::Cancel,
            "expire" => Self::Expire,
            other => Self::Other(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for GatewayTransactionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

/// Gateway fraud screening verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FraudStatus {
    Accept,
    Challenge,
    Deny,
    Other(String),
}

impl From<&str> for FraudStatus {
    fn from(s: &str) -> Self {
        match s {
            "accept" => Self::Accept,
            "challenge" => Self::Challenge,
            "deny" => Self::Deny,
            other => Self::Other(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for FraudStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

/// Fixed precedence mapping from gateway vocabulary to internal vocabulary.
///
/// A captured/settled payment is only PAID when fraud screening accepted it
/// (or was not performed at all); a flagged capture fails the transaction.
pub fn map_status(
    status: &GatewayTransactionStatus,
    fraud: Option<&FraudStatus>,
) -> (TransactionStatus, BookingStatus) {
    use GatewayTransactionStatus::*;

    match status {
        Capture | Settlement => match fraud {
            None | Some(FraudStatus::Accept) => (TransactionStatus::Paid, BookingStatus::Confirmed),
            Some(_) => (TransactionStatus::Failed, BookingStatus::Cancelled),
        },
        Pending => (TransactionStatus::Pending, BookingStatus::Pending),
        Deny | Cancel => (TransactionStatus::Failed, BookingStatus::Cancelled),
        Expire => (TransactionStatus::Expired, BookingStatus::Cancelled),
        Other(_) => (TransactionStatus::Failed, BookingStatus::Cancelled),
    }
}

/// What a webhook delivery did.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// A fresh transition was persisted (transaction and booking together).
    Applied {
        transaction: Transaction,
        booking: Booking,
        /// True only for the Pending -> Paid transition; the caller fires
        /// notifications exactly when this is set.
        became_paid: bool,
    },
    /// The transaction settled, but the booking had already reached a
    /// terminal status (cancelled while the payment was in flight) and was
    /// not reopened. No notifications fire; the money trail lives in the
    /// transaction row.
    BookingClosed {
        transaction: Transaction,
        booking: Booking,
    },
    /// Gateway still reports pending; nothing to change.
    StillPending,
    /// Replay of an outcome already recorded - a no-op.
    Duplicate,
    /// The stored status is terminal and the webhook reports a different
    /// terminal outcome. First terminal write wins; logged, acked, ignored.
    ConflictIgnored {
        stored: TransactionStatus,
        reported: TransactionStatus,
    },
}

/// Process one gateway callback.
///
/// Ordering of the gates matters: the signature is verified before any
/// database read keyed on caller-supplied data, so a forged payload learns
/// nothing. The dual write is a single SQLite transaction with a
/// compare-and-swap on the transaction row (see
/// [`queries::settle_transaction`]), which is the sole concurrency control
/// between simultaneous deliveries of the same `order_id`.
pub fn reconcile<V: SignatureVerifier>(
    verifier: &V,
    conn: &mut Connection,
    note: &GatewayNotification,
) -> Result<ReconcileOutcome> {
    // 1. Authenticity gate. No state is touched on mismatch.
    if !verifier.verify_signature(
        &note.order_id,
        &note.status_code,
        &note.gross_amount,
        &note.signature_key,
    ) {
        tracing::warn!("Rejected webhook with bad signature for order {}", note.order_id);
        return Err(AppError::InvalidSignature);
    }

    // 2. Lookup by the unique provider reference. A stale or forged (but
    // correctly signed) reference is surfaced as NotFound.
    let txn = queries::get_transaction_by_provider_ref(conn, &note.order_id)?
        .ok_or_else(|| AppError::NotFound(msg::TRANSACTION_NOT_FOUND.into()))?;

    // 3. Map the gateway vocabulary onto ours.
    let (new_status, new_booking_status) =
        map_status(&note.transaction_status, note.fraud_status.as_ref());

    if new_status == TransactionStatus::Pending {
        return Ok(ReconcileOutcome::StillPending);
    }

    // Idempotency: a terminal row is never re-transitioned. Same outcome is
    // a silent no-op; a different one is a conflicting update.
    if txn.status.is_terminal() {
        if txn.status == new_status {
            return Ok(ReconcileOutcome::Duplicate);
        }
        tracing::warn!(
            "Conflicting terminal webhook for order {}: stored={}, reported={} - keeping stored",
            note.order_id,
            txn.status,
            new_status
        );
        return Ok(ReconcileOutcome::ConflictIgnored {
            stored: txn.status,
            reported: new_status,
        });
    }

    // 4. Atomic dual update. The CAS may lose against a concurrent delivery
    // of the same webhook; re-read and classify rather than overwrite.
    let settled = queries::settle_transaction(
        conn,
        &txn.id,
        &txn.booking_id,
        new_status,
        new_booking_status,
    )?;

    if settled == SettleResult::TransactionNotPending {
        let current = queries::get_transaction_by_id(conn, &txn.id)?
            .ok_or_else(|| AppError::Internal(format!("Transaction {} vanished", txn.id)))?;
        if current.status == new_status {
            return Ok(ReconcileOutcome::Duplicate);
        }
        tracing::warn!(
            "Concurrent webhook won for order {}: stored={}, reported={} - keeping stored",
            note.order_id,
            current.status,
            new_status
        );
        return Ok(ReconcileOutcome::ConflictIgnored {
            stored: current.status,
            reported: new_status,
        });
    }

    let transaction = queries::get_transaction_by_id(conn, &txn.id)?
        .ok_or_else(|| AppError::Internal(format!("Transaction {} vanished", txn.id)))?;
    let booking = queries::get_booking_by_id(conn, &txn.booking_id)?
        .ok_or_else(|| AppError::Internal(format!("Booking {} vanished", txn.booking_id)))?;

    if settled == SettleResult::BookingClosed {
        tracing::warn!(
            "Order {} settled to {} but booking {} is already {} - not reopening",
            note.order_id,
            transaction.status,
            booking.id,
            booking.status
        );
        return Ok(ReconcileOutcome::BookingClosed {
            transaction,
            booking,
        });
    }

    tracing::info!(
        "Reconciled order {}: transaction {} -> {}, booking {} -> {}",
        note.order_id,
        transaction.id,
        transaction.status,
        booking.id,
        booking.status
    );

    Ok(ReconcileOutcome::Applied {
        became_paid: new_status == TransactionStatus::Paid,
        transaction,
        booking,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settlement_accepted_maps_to_paid() {
        let (t, b) = map_status(&GatewayTransactionStatus::Settlement, Some(&FraudStatus::Accept));
        assert_eq!(t, TransactionStatus::Paid);
        assert_eq!(b, BookingStatus::Confirmed);
    }

    #[test]
    fn test_capture_without_fraud_status_maps_to_paid() {
        let (t, b) = map_status(&GatewayTransactionStatus::Capture, None);
        assert_eq!(t, TransactionStatus::Paid);
        assert_eq!(b, BookingStatus::Confirmed);
    }

    #[test]
    fn test_flagged_capture_fails() {
        for fraud in [FraudStatus::Challenge, FraudStatus::Deny, FraudStatus::Other("review".into())] {
            let (t, b) = map_status(&GatewayTransactionStatus::Capture, Some(&fraud));
            assert_eq!(t, TransactionStatus::Failed);
            assert_eq!(b, BookingStatus::Cancelled);
        }
    }

    #[test]
    fn test_pending_stays_pending() {
        let (t, b) = map_status(&GatewayTransactionStatus::Pending, None);
        assert_eq!(t, TransactionStatus::Pending);
        assert_eq!(b, BookingStatus::Pending);
    }

    #[test]
    fn test_deny_and_cancel_fail() {
        for status in [GatewayTransactionStatus::Deny, GatewayTransactionStatus::Cancel] {
            let (t, b) = map_status(&status, None);
            assert_eq!(t, TransactionStatus::Failed);
            assert_eq!(b, BookingStatus::Cancelled);
        }
    }

    #[test]
    fn test_expire_maps_to_expired() {
        let (t, b) = map_status(&GatewayTransactionStatus::Expire, None);
        assert_eq!(t, TransactionStatus::Expired);
        assert_eq!(b, BookingStatus::Cancelled);
    }

    #[test]
    fn test_unknown_status_routed_to_failed() {
        let (t, b) = map_status(&GatewayTransactionStatus::Other("refund_chargeback".into()), None);
        assert_eq!(t, TransactionStatus::Failed);
        assert_eq!(b, BookingStatus::Cancelled);
    }

    #[test]
    fn test_status_parsing_from_wire() {
        let note: GatewayNotification = serde_json::from_str(
            r#"{
                "order_id": "X",
                "transaction_status": "settlement",
                "fraud_status": "accept",
                "status_code": "200",
                "gross_amount": "100000.00",
                "signature_key": "sig"
            }"#,
        )
        .expect("valid payload");
        assert_eq!(note.transaction_status, GatewayTransactionStatus::Settlement);
        assert_eq!(note.fraud_status, Some(FraudStatus::Accept));
    }

    #[test]
    fn test_unknown_wire_status_parses_as_other() {
        let status: GatewayTransactionStatus =
            serde_json::from_str("\"partial_refund\"").expect("string parses");
        assert_eq!(status, GatewayTransactionStatus::Other("partial_refund".into()));
    }
}
