//! Best-effort notification dispatch.
//!
//! Notifications are a side channel of the payment flow, never part of it:
//! a failure to persist or deliver one must not roll back - or even report
//! failure for - the financial state transition that triggered it. Callers
//! invoke [`dispatch_payment_confirmed`] after the reconciler commits; every
//! error inside is logged and swallowed.
//!
//! Push delivery goes to an external webhook (when configured) in a spawned
//! task with a bounded timeout. Panics in the task are caught and logged.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use reqwest::Client;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::models::{Booking, CreateNotification, User};

/// Notification kinds stored with each row.
pub const KIND_PAYMENT_CONFIRMED: &str = "payment_confirmed";
pub const KIND_BOOKING_CONFIRMED: &str = "booking_confirmed";

/// Per-attempt delivery timeout for the push webhook.
const PUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Payload posted to the push webhook (owned version for async spawning).
#[derive(Debug, Clone, Serialize)]
pub struct PushEvent {
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub kind: String,
    pub data: serde_json::Value,
}

/// Build the student + teacher notification pair for a booking that just
/// became paid.
pub fn payment_confirmed_notifications(
    booking: &Booking,
    student: &User,
    teacher: &User,
) -> (CreateNotification, CreateNotification) {
    let payload = serde_json::json!({
        "booking_id": booking.id,
        "amount": booking.total_price,
        "scheduled_at": booking.scheduled_at,
    })
    .to_string();

    let to_student = CreateNotification {
        user_id: student.id.clone(),
        title: "Payment confirmed".to_string(),
        body: "Your payment was received and your session is confirmed.".to_string(),
        kind: KIND_PAYMENT_CONFIRMED.to_string(),
        payload: Some(payload.clone()),
    };

    let to_teacher = CreateNotification {
        user_id: teacher.id.clone(),
        title: "Booking confirmed".to_string(),
        body: format!("{} paid for the session. The booking is confirmed.", student.name),
        kind: KIND_BOOKING_CONFIRMED.to_string(),
        payload: Some(payload),
    };

    (to_student, to_teacher)
}

/// Persist the notification pair and fire push events for a fresh PAID
/// transition. Best-effort throughout: each failure is logged, none is
/// surfaced to the webhook response.
pub fn dispatch_payment_confirmed(
    conn: &Connection,
    http_client: &Client,
    push_url: &Option<String>,
    booking: &Booking,
    student: &User,
    teacher: &User,
) {
    let (to_student, to_teacher) = payment_confirmed_notifications(booking, student, teacher);

    for input in [&to_student, &to_teacher] {
        if let Err(e) = queries::create_notification(conn, input) {
            tracing::warn!(
                "Failed to persist '{}' notification for user {}: {}",
                input.kind,
                input.user_id,
                e
            );
        }
    }

    for input in [to_student, to_teacher] {
        spawn_push(
            http_client.clone(),
            push_url.clone(),
            PushEvent {
                user_id: input.user_id,
                title: input.title,
                body: input.body,
                kind: input.kind,
                data: serde_json::json!({ "booking_id": booking.id }),
            },
        );
    }
}

/// Spawn a fire-and-forget push delivery.
///
/// If no push webhook is configured, this is a no-op. The event is sent in
/// a background task; failures don't affect the caller, and panics in the
/// task are logged rather than silently swallowed.
pub fn spawn_push(client: Client, push_url: Option<String>, event: PushEvent) {
    if let Some(url) = push_url {
        let kind = event.kind.clone();
        tokio::spawn(
            AssertUnwindSafe(async move {
                send_push(&client, &url, &event).await;
            })
            .catch_unwind()
            .map(move |result| {
                if let Err(panic) = result {
                    let panic_msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!("Push task panicked for '{}' event: {}", kind, panic_msg);
                }
            }),
        );
    }
}

async fn send_push(client: &Client, url: &str, event: &PushEvent) {
    match client
        .post(url)
        .json(event)
        .timeout(PUSH_TIMEOUT)
        .send()
        .await
    {
        Ok(response) if response.status().is_success() => {
            tracing::debug!("Push '{}' delivered for user {}", event.kind, event.user_id);
        }
        Ok(response) => {
            tracing::warn!(
                "Push webhook returned {} for '{}' event (user {})",
                response.status(),
                event.kind,
                event.user_id
            );
        }
        Err(e) => {
            tracing::warn!(
                "Push delivery failed for '{}' event (user {}): {}",
                event.kind,
                event.user_id,
                e
            );
        }
    }
}
