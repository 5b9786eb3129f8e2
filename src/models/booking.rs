use serde::{Deserialize, Serialize};

/// A scheduled tutoring session between a student and a teacher.
///
/// A booking has at most one associated [`Transaction`](super::Transaction)
/// (enforced by a UNIQUE constraint on `transactions.booking_id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub student_id: String,
    pub teacher_id: String,
    pub subject_id: String,
    /// Session start (Unix timestamp).
    pub scheduled_at: i64,
    pub duration_minutes: i64,
    /// Price in the smallest currency unit. Immutable after creation.
    pub total_price: i64,
    pub status: BookingStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateBooking {
    pub teacher_id: String,
    pub subject_id: String,
    pub scheduled_at: i64,
    pub duration_minutes: i64,
    pub total_price: i64,
}

/// Booking lifecycle.
///
/// Created `Pending`; moves to `Confirmed` only via successful payment
/// reconciliation or direct teacher confirmation; `Cancelled` is reachable
/// from `Pending` and `Confirmed`. `Cancelled` and `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// Terminal states admit no further automatic transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
