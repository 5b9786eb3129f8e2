use axum::{extract::State, Extension};

use crate::auth::AuthUser;
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Path};
use crate::models::{RefundRequest, Transaction, TransactionStatus, UserRole};

/// Minimum length of a refund justification.
const MIN_REFUND_REASON_LEN: usize = 10;

/// Reason validation runs before anything touches the database.
pub fn validate_refund_reason(reason: &str) -> Result<()> {
    if reason.trim().chars().count() < MIN_REFUND_REASON_LEN {
        return Err(AppError::BadRequest(msg::REFUND_REASON_TOO_SHORT.into()));
    }
    Ok(())
}

/// Resolve the refund amount: defaults to the full transaction amount,
/// must be positive and must not exceed it.
pub fn resolve_refund_amount(requested: Option<i64>, transaction_amount: i64) -> Result<i64> {
    let amount = requested.unwrap_or(transaction_amount);
    if amount <= 0 || amount > transaction_amount {
        return Err(AppError::BadRequest(msg::REFUND_AMOUNT_INVALID.into()));
    }
    Ok(amount)
}

/// `POST /admin/transactions/{id}/refund` - mark a PAID transaction
/// refunded.
///
/// The booking status is deliberately left untouched: the session may
/// already have taken place by the time the refund is issued.
pub async fn refund_transaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(transaction_id): Path<String>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<Transaction>> {
    auth.require_role(UserRole::Admin)?;

    validate_refund_reason(&request.reason)?;

    if !crate::id::is_valid_prefixed_id(&transaction_id) {
        return Err(AppError::NotFound(msg::TRANSACTION_NOT_FOUND.into()));
    }

    let conn = state.db.get()?;

    let transaction = queries::get_transaction_by_id(&conn, &transaction_id)?
        .or_not_found(msg::TRANSACTION_NOT_FOUND)?;

    if transaction.status != TransactionStatus::Paid || transaction.is_refunded {
        return Err(AppError::Conflict(msg::REFUND_NOT_ELIGIBLE.into()));
    }

    let amount = resolve_refund_amount(request.amount, transaction.amount)?;

    // Conditional update: the WHERE clause re-checks eligibility, so a
    // concurrent second refund finds zero rows to touch.
    let applied = queries::apply_refund(
        &conn,
        &transaction.id,
        amount,
        request.reason.trim(),
        &auth.user_id,
    )?;
    if !applied {
        return Err(AppError::Conflict(msg::REFUND_NOT_ELIGIBLE.into()));
    }

    let updated = queries::get_transaction_by_id(&conn, &transaction.id)?
        .or_not_found(msg::TRANSACTION_NOT_FOUND)?;

    tracing::info!(
        "Refunded transaction {}: amount={}, by={}",
        updated.id,
        amount,
        auth.user_id
    );

    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_of_nine_chars_rejected() {
        assert!(validate_refund_reason("123456789").is_err());
        assert!(validate_refund_reason("1234567890").is_ok());
    }

    #[test]
    fn test_whitespace_padding_does_not_count() {
        assert!(validate_refund_reason("   short    ").is_err());
    }

    #[test]
    fn test_amount_defaults_to_full() {
        assert_eq!(resolve_refund_amount(None, 100_000).expect("full refund"), 100_000);
    }

    #[test]
    fn test_amount_bounds() {
        assert!(resolve_refund_amount(Some(0), 100_000).is_err());
        assert!(resolve_refund_amount(Some(-5), 100_000).is_err());
        assert!(resolve_refund_amount(Some(100_001), 100_000).is_err());
        assert_eq!(resolve_refund_amount(Some(50_000), 100_000).expect("partial"), 50_000);
    }
}
