//! Prefixed ID generation for Tutorbase entities.
//!
//! All IDs use a `tb_` brand prefix to guarantee collision avoidance with
//! payment gateway identifiers (Midtrans order IDs, Snap tokens, etc.).
//!
//! Format: `tb_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &[
    "tb_usr_",
    "tb_subj_",
    "tb_bkg_",
    "tb_txn_",
    "tb_ntf_",
];

/// Validate that a string is a valid Tutorbase prefixed ID.
///
/// This is a cheap check to reject garbage before hitting the database.
/// Validates format: `tb_{entity}_{32_hex_chars}`
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Entity types that have prefixed IDs in Tutorbase.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    User,
    Subject,
    Booking,
    Transaction,
    Notification,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::User => "tb_usr",
            Self::Subject => "tb_subj",
            Self::Booking => "tb_bkg",
            Self::Transaction => "tb_txn",
            Self::Notification => "tb_ntf",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
