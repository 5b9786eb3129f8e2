use serde::{Deserialize, Serialize};

/// A teachable subject (math, physics, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubject {
    pub name: String,
}
