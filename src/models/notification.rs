use serde::{Deserialize, Serialize};

/// Best-effort in-app notification. Not authoritative state: failure to
/// persist or deliver one never affects booking or transaction state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub kind: String,
    /// Opaque JSON payload for the client (booking id, amounts, ...).
    pub payload: Option<String>,
    pub is_read: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateNotification {
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub kind: String,
    #[serde(default)]
    pub payload: Option<String>,
}
