//! Payment gateway integration.
//!
//! The gateway is treated as a black box with two operations: creating a
//! hosted-payment-session and verifying webhook signatures. The
//! [`SignatureVerifier`] trait is the seam the webhook reconciler is generic
//! over, so tests can substitute a fake verifier.

mod midtrans;

pub use midtrans::MidtransClient;

/// Gateway credentials and endpoint, loaded from the environment.
#[derive(Debug, Clone)]
pub struct MidtransConfig {
    /// Server key, shared secret for webhook signatures.
    pub server_key: String,
    /// Snap API base URL (sandbox by default).
    pub snap_base_url: String,
}

/// Authenticity check for inbound gateway webhooks.
pub trait SignatureVerifier {
    /// Recompute the expected signature from the payload fields and compare
    /// it byte-for-byte against the supplied one.
    fn verify_signature(
        &self,
        order_id: &str,
        status_code: &str,
        gross_amount: &str,
        signature: &str,
    ) -> bool;
}

/// Customer contact details forwarded to the hosted checkout page.
#[derive(Debug, Clone)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// A hosted-payment-session minted by the gateway.
#[derive(Debug, Clone)]
pub struct HostedSession {
    pub token: String,
    pub redirect_url: String,
}
