use axum::{extract::State, Extension};
use chrono::Utc;
use serde::Serialize;

use crate::auth::AuthUser;
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Path};
use crate::models::{Booking, BookingStatus, CreateTransaction, Transaction, UserRole};
use crate::notify;
use crate::payments::{CustomerDetails, MidtransClient};
use crate::reconcile::{reconcile, GatewayNotification, ReconcileOutcome};

/// Preconditions for initiating a payment: the caller owns the booking,
/// the booking is still awaiting payment, and no transaction exists yet
/// (the 1:1 invariant; also enforced by a UNIQUE constraint on insert).
pub fn ensure_payable(
    booking: &Booking,
    caller_id: &str,
    existing: Option<&Transaction>,
) -> Result<()> {
    if booking.student_id != caller_id {
        return Err(AppError::Forbidden(msg::NOT_BOOKING_OWNER.into()));
    }
    if booking.status != BookingStatus::Pending {
        return Err(AppError::BadRequest(msg::BOOKING_NOT_PENDING.into()));
    }
    if existing.is_some() {
        return Err(AppError::Conflict(msg::TRANSACTION_EXISTS.into()));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct InitiatePaymentResponse {
    pub transaction_id: String,
    pub order_id: String,
    pub snap_token: String,
    pub redirect_url: String,
    pub amount: i64,
}

/// `POST /payments/booking/{booking_id}` - start a payment for a pending
/// booking owned by the calling student.
///
/// The transaction row is written only after the gateway accepted the
/// session request; a gateway failure leaves no local state behind.
pub async fn initiate_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(booking_id): Path<String>,
) -> Result<Json<InitiatePaymentResponse>> {
    auth.require_role(UserRole::Student)?;

    if !crate::id::is_valid_prefixed_id(&booking_id) {
        return Err(AppError::NotFound(msg::BOOKING_NOT_FOUND.into()));
    }

    let conn = state.db.get()?;

    let booking = queries::get_booking_by_id(&conn, &booking_id)?
        .or_not_found(msg::BOOKING_NOT_FOUND)?;

    let existing = queries::get_transaction_by_booking(&conn, &booking.id)?;
    ensure_payable(&booking, &auth.user_id, existing.as_ref())?;

    let student = queries::get_user_by_id(&conn, &booking.student_id)?
        .or_not_found(msg::USER_NOT_FOUND)?;

    // Order reference: booking id + initiation timestamp. Unique per
    // attempt and unguessable enough (the booking id embeds a UUID).
    let order_id = format!("{}-{}", booking.id, Utc::now().timestamp());

    let gateway = MidtransClient::new(state.http_client.clone(), &state.midtrans);
    let session = gateway
        .create_session(
            &order_id,
            booking.total_price,
            &CustomerDetails {
                name: student.name.clone(),
                email: student.email.clone(),
                phone: student.phone.clone(),
            },
        )
        .await?;

    let transaction = queries::create_transaction(
        &conn,
        &CreateTransaction {
            booking_id: booking.id.clone(),
            provider: "midtrans".to_string(),
            provider_ref: order_id.clone(),
            snap_token: Some(session.token.clone()),
            redirect_url: Some(session.redirect_url.clone()),
            amount: booking.total_price,
        },
    )?;

    Ok(Json(InitiatePaymentResponse {
        transaction_id: transaction.id,
        order_id,
        snap_token: session.token,
        redirect_url: session.redirect_url,
        amount: booking.total_price,
    }))
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub message: &'static str,
}

/// `POST /payments/webhook` - gateway callback.
///
/// Every handled outcome - fresh transition, duplicate replay, conflicting
/// terminal report, settlement against an already-cancelled booking - is
/// acked with the same 200 body so the gateway stops retrying. Non-2xx only
/// on signature failure or an unknown order reference.
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    Json(note): Json<GatewayNotification>,
) -> Result<Json<WebhookAck>> {
    let mut conn = state.db.get()?;

    let gateway = MidtransClient::new(state.http_client.clone(), &state.midtrans);
    let outcome = reconcile(&gateway, &mut conn, &note)?;

    // Side-effect boundary. The financial transition above is already
    // committed; nothing below may fail this handler.
    if let ReconcileOutcome::Applied {
        became_paid: true,
        booking,
        ..
    } = &outcome
    {
        let parties = (
            queries::get_user_by_id(&conn, &booking.student_id),
            queries::get_user_by_id(&conn, &booking.teacher_id),
        );
        match parties {
            (Ok(Some(student)), Ok(Some(teacher))) => {
                notify::dispatch_payment_confirmed(
                    &conn,
                    &state.http_client,
                    &state.push_webhook_url,
                    booking,
                    &student,
                    &teacher,
                );
            }
            _ => {
                tracing::warn!(
                    "Skipping notifications for booking {}: party lookup failed",
                    booking.id
                );
            }
        }
    }

    Ok(Json(WebhookAck {
        message: "Webhook processed successfully",
    }))
}
