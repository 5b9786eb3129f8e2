//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupted data.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
///
/// Implementing this trait allows using the `query_one` and `query_all`
/// helper functions, reducing repetitive row mapping closures.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, email, name, phone, role, created_at";

pub const SUBJECT_COLS: &str = "id, name, created_at";

pub const BOOKING_COLS: &str = "id, student_id, teacher_id, subject_id, scheduled_at, duration_minutes, total_price, status, created_at, updated_at";

pub const TRANSACTION_COLS: &str = "id, booking_id, provider, provider_ref, snap_token, redirect_url, amount, status, is_refunded, refunded_amount, refund_reason, refunded_at, refunded_by, created_at, updated_at";

pub const NOTIFICATION_COLS: &str =
    "id, user_id, title, body, kind, payload, is_read, created_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            phone: row.get(3)?,
            role: parse_enum(row, 4, "role")?,
            created_at: row.get(5)?,
        })
    }
}

impl FromRow for Subject {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Subject {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
        })
    }
}

impl FromRow for Booking {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Booking {
            id: row.get(0)?,
            student_id: row.get(1)?,
            teacher_id: row.get(2)?,
            subject_id: row.get(3)?,
            scheduled_at: row.get(4)?,
            duration_minutes: row.get(5)?,
            total_price: row.get(6)?,
            status: parse_enum(row, 7, "status")?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl FromRow for Transaction {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Transaction {
            id: row.get(0)?,
            booking_id: row.get(1)?,
            provider: row.get(2)?,
            provider_ref: row.get(3)?,
            snap_token: row.get(4)?,
            redirect_url: row.get(5)?,
            amount: row.get(6)?,
            status: parse_enum(row, 7, "status")?,
            is_refunded: row.get(8)?,
            refunded_amount: row.get(9)?,
            refund_reason: row.get(10)?,
            refunded_at: row.get(11)?,
            refunded_by: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }
}

impl FromRow for Notification {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Notification {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            body: row.get(3)?,
            kind: row.get(4)?,
            payload: row.get(5)?,
            is_read: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}
