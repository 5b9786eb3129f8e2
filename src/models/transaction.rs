use serde::{Deserialize, Serialize};

/// One payment attempt against a single booking (1:1).
///
/// `provider_ref` is globally unique and serves as the idempotency key for
/// webhook processing. `amount` is immutable once created. Rows are never
/// deleted; they are mutated only by the webhook reconciler or an explicit
/// admin refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub booking_id: String,

    // Gateway info
    pub provider: String,
    /// External order reference sent to the gateway (unique).
    pub provider_ref: String,
    /// Hosted-payment-session token returned by the gateway.
    pub snap_token: Option<String>,
    pub redirect_url: Option<String>,

    /// Amount in the smallest currency unit.
    pub amount: i64,
    pub status: TransactionStatus,

    // Refund metadata (admin-only transition, PAID transactions only)
    pub is_refunded: bool,
    pub refunded_amount: Option<i64>,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<i64>,
    pub refunded_by: Option<String>,

    pub created_at: i64,
    pub updated_at: i64,
}

/// Data required to create a new transaction.
#[derive(Debug, Clone)]
pub struct CreateTransaction {
    pub booking_id: String,
    pub provider: String,
    pub provider_ref: String,
    pub snap_token: Option<String>,
    pub redirect_url: Option<String>,
    pub amount: i64,
}

/// Transaction lifecycle: `Pending` -> {`Paid`, `Failed`, `Expired`}.
/// `Paid` can additionally be marked refunded (separate admin transition);
/// no status ever moves back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Paid,
    Failed,
    Expired,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }

    /// Paid, Failed and Expired admit no further webhook-driven transition.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Refund request body for the admin endpoint.
#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    /// Human-readable justification, minimum 10 characters.
    pub reason: String,
    /// Defaults to the full transaction amount when omitted.
    #[serde(default)]
    pub amount: Option<i64>,
}
