mod admin;
mod bookings;
mod notifications;
mod payments;

pub use admin::*;
pub use bookings::*;
pub use notifications::*;
pub use payments::*;

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::auth::require_auth;
use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(state: AppState) -> Router<AppState> {
    // Everything except the health check and the gateway webhook sits
    // behind bearer auth. The webhook is transport-unauthenticated by
    // design; its authenticity gate is the payload signature.
    let authed = Router::new()
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/bookings/{id}/confirm", post(confirm_booking))
        .route("/bookings/{id}/cancel", post(cancel_booking))
        .route("/subjects", get(list_subjects))
        .route("/payments/booking/{booking_id}", post(initiate_payment))
        .route("/admin/transactions/{id}/refund", post(refund_transaction))
        .route("/notifications", get(list_notifications))
        .route("/notifications/{id}/read", post(mark_notification_read))
        .layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/health", get(health))
        .route("/payments/webhook", post(handle_payment_webhook))
        .merge(authed)
}
