use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode};

use crate::error::{msg, AppError, Result};
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{
    query_all, query_one, BOOKING_COLS, NOTIFICATION_COLS, SUBJECT_COLS, TRANSACTION_COLS,
    USER_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

/// Detect SQLite UNIQUE constraint violations so callers can surface them
/// as `Conflict` instead of a 500.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

// ============ Users ============

pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    let id = EntityType::User.gen_id();
    let now = now();
    let email = input.email.trim().to_lowercase();

    conn.execute(
        "INSERT INTO users (id, email, name, phone, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![&id, &email, &input.name, &input.phone, input.role.as_str(), now],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Email already registered".into())
        } else {
            e.into()
        }
    })?;

    Ok(User {
        id,
        email,
        name: input.name.clone(),
        phone: input.phone.clone(),
        role: input.role,
        created_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLS),
        &[&email.trim().to_lowercase()],
    )
}

// ============ Subjects ============

pub fn create_subject(conn: &Connection, input: &CreateSubject) -> Result<Subject> {
    let id = EntityType::Subject.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO subjects (id, name, created_at) VALUES (?1, ?2, ?3)",
        params![&id, &input.name, now],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Subject already exists".into())
        } else {
            e.into()
        }
    })?;

    Ok(Subject {
        id,
        name: input.name.clone(),
        created_at: now,
    })
}

pub fn get_subject_by_id(conn: &Connection, id: &str) -> Result<Option<Subject>> {
    query_one(
        conn,
        &format!("SELECT {} FROM subjects WHERE id = ?1", SUBJECT_COLS),
        &[&id],
    )
}

pub fn list_subjects(conn: &Connection) -> Result<Vec<Subject>> {
    query_all(
        conn,
        &format!("SELECT {} FROM subjects ORDER BY name", SUBJECT_COLS),
        &[],
    )
}

// ============ Bookings ============

pub fn create_booking(conn: &Connection, student_id: &str, input: &CreateBooking) -> Result<Booking> {
    let id = EntityType::Booking.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO bookings
            (id, student_id, teacher_id, subject_id, scheduled_at, duration_minutes,
             total_price, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, ?8)",
        params![
            &id,
            student_id,
            &input.teacher_id,
            &input.subject_id,
            input.scheduled_at,
            input.duration_minutes,
            input.total_price,
            now
        ],
    )?;

    Ok(Booking {
        id,
        student_id: student_id.to_string(),
        teacher_id: input.teacher_id.clone(),
        subject_id: input.subject_id.clone(),
        scheduled_at: input.scheduled_at,
        duration_minutes: input.duration_minutes,
        total_price: input.total_price,
        status: BookingStatus::Pending,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> Result<Option<Booking>> {
    query_one(
        conn,
        &format!("SELECT {} FROM bookings WHERE id = ?1", BOOKING_COLS),
        &[&id],
    )
}

/// Bookings where the user is either the student or the teacher.
pub fn list_bookings_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Booking>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM bookings WHERE student_id = ?1 OR teacher_id = ?1
             ORDER BY scheduled_at DESC",
            BOOKING_COLS
        ),
        &[&user_id],
    )
}

/// Conditional Pending -> Confirmed transition (direct teacher confirmation).
/// Returns false when the booking was not in Pending.
pub fn confirm_booking(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE bookings SET status = 'confirmed', updated_at = ?2
         WHERE id = ?1 AND status = 'pending'",
        params![id, now()],
    )?;
    Ok(affected > 0)
}

/// Conditional {Pending, Confirmed} -> Cancelled transition.
/// Returns false when the booking was already terminal.
pub fn cancel_booking(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE bookings SET status = 'cancelled', updated_at = ?2
         WHERE id = ?1 AND status IN ('pending', 'confirmed')",
        params![id, now()],
    )?;
    Ok(affected > 0)
}

// ============ Transactions ============

/// Create the payment transaction for a booking.
///
/// The UNIQUE constraint on `booking_id` enforces the 1:1 invariant at the
/// storage layer; a violation surfaces as `Conflict` so concurrent initiation
/// requests cannot both succeed.
pub fn create_transaction(conn: &Connection, input: &CreateTransaction) -> Result<Transaction> {
    let id = EntityType::Transaction.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO transactions
            (id, booking_id, provider, provider_ref, snap_token, redirect_url,
             amount, status, is_refunded, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', 0, ?8, ?8)",
        params![
            &id,
            &input.booking_id,
            &input.provider,
            &input.provider_ref,
            &input.snap_token,
            &input.redirect_url,
            input.amount,
            now
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(msg::TRANSACTION_EXISTS.into())
        } else {
            e.into()
        }
    })?;

    Ok(Transaction {
        id,
        booking_id: input.booking_id.clone(),
        provider: input.provider.clone(),
        provider_ref: input.provider_ref.clone(),
        snap_token: input.snap_token.clone(),
        redirect_url: input.redirect_url.clone(),
        amount: input.amount,
        status: TransactionStatus::Pending,
        is_refunded: false,
        refunded_amount: None,
        refund_reason: None,
        refunded_at: None,
        refunded_by: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_transaction_by_id(conn: &Connection, id: &str) -> Result<Option<Transaction>> {
    query_one(
        conn,
        &format!("SELECT {} FROM transactions WHERE id = ?1", TRANSACTION_COLS),
        &[&id],
    )
}

pub fn get_transaction_by_booking(conn: &Connection, booking_id: &str) -> Result<Option<Transaction>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM transactions WHERE booking_id = ?1",
            TRANSACTION_COLS
        ),
        &[&booking_id],
    )
}

/// Lookup by the gateway order reference - the webhook idempotency anchor.
pub fn get_transaction_by_provider_ref(
    conn: &Connection,
    provider_ref: &str,
) -> Result<Option<Transaction>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM transactions WHERE provider_ref = ?1",
            TRANSACTION_COLS
        ),
        &[&provider_ref],
    )
}

/// Outcome of [`settle_transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleResult {
    /// Transaction and booking were updated together.
    Applied,
    /// The transaction row was no longer pending; nothing was written.
    TransactionNotPending,
    /// The transaction was settled, but the booking had already reached a
    /// terminal status and was left untouched.
    BookingClosed,
}

/// Atomically settle a transaction and its booking.
///
/// Both writes happen inside one SQLite transaction, with the financial row
/// written first. The transaction update is a compare-and-swap on
/// `status = 'pending'`: if another webhook delivery already moved the row
/// out of Pending, nothing is written and `TransactionNotPending` is
/// returned so the caller can re-read and treat the delivery as a
/// duplicate. The booking update skips terminal rows: a booking cancelled
/// while the payment was in flight stays cancelled (`BookingClosed`), the
/// settled transaction is still recorded.
pub fn settle_transaction(
    conn: &mut Connection,
    transaction_id: &str,
    booking_id: &str,
    new_status: TransactionStatus,
    new_booking_status: BookingStatus,
) -> Result<SettleResult> {
    let now = now();
    let tx = conn.transaction()?;

    let affected = tx.execute(
        "UPDATE transactions SET status = ?2, updated_at = ?3
         WHERE id = ?1 AND status = 'pending'",
        params![transaction_id, new_status.as_str(), now],
    )?;

    if affected == 0 {
        // Lost the race (or already terminal). Nothing to commit.
        return Ok(SettleResult::TransactionNotPending);
    }

    let booking_affected = tx.execute(
        "UPDATE bookings SET status = ?2, updated_at = ?3
         WHERE id = ?1 AND status NOT IN ('cancelled', 'completed')",
        params![booking_id, new_booking_status.as_str(), now],
    )?;

    tx.commit()?;

    if booking_affected == 0 {
        Ok(SettleResult::BookingClosed)
    } else {
        Ok(SettleResult::Applied)
    }
}

/// Mark a PAID transaction refunded, recording the refund metadata.
///
/// Single conditional statement: only a paid, not-yet-refunded row is
/// touched, so a double refund cannot slip through concurrently.
/// Returns false when the transaction was not eligible.
pub fn apply_refund(
    conn: &Connection,
    transaction_id: &str,
    amount: i64,
    reason: &str,
    refunded_by: &str,
) -> Result<bool> {
    let now = now();
    let affected = conn.execute(
        "UPDATE transactions
         SET is_refunded = 1, refunded_amount = ?2, refund_reason = ?3,
             refunded_at = ?4, refunded_by = ?5, updated_at = ?4
         WHERE id = ?1 AND status = 'paid' AND is_refunded = 0",
        params![transaction_id, amount, reason, now, refunded_by],
    )?;
    Ok(affected > 0)
}

// ============ Notifications ============

pub fn create_notification(conn: &Connection, input: &CreateNotification) -> Result<Notification> {
    let id = EntityType::Notification.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO notifications (id, user_id, title, body, kind, payload, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
        params![&id, &input.user_id, &input.title, &input.body, &input.kind, &input.payload, now],
    )?;

    Ok(Notification {
        id,
        user_id: input.user_id.clone(),
        title: input.title.clone(),
        body: input.body.clone(),
        kind: input.kind.clone(),
        payload: input.payload.clone(),
        is_read: false,
        created_at: now,
    })
}

pub fn list_notifications_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Notification>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM notifications WHERE user_id = ?1 ORDER BY created_at DESC",
            NOTIFICATION_COLS
        ),
        &[&user_id],
    )
}

/// Mark a notification read. Ownership is part of the WHERE clause so a
/// user cannot touch another user's notifications.
pub fn mark_notification_read(conn: &Connection, id: &str, user_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    Ok(affected > 0)
}

/// Count all notifications a user has received.
pub fn count_notifications_for_user(conn: &Connection, user_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
