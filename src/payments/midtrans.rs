use serde::Deserialize;
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

use super::{CustomerDetails, HostedSession, MidtransConfig, SignatureVerifier};

#[derive(Debug, Deserialize)]
struct CreateSnapResponse {
    token: String,
    redirect_url: String,
}

/// Client for the Midtrans Snap API.
#[derive(Debug, Clone)]
pub struct MidtransClient {
    client: reqwest::Client,
    server_key: String,
    snap_base_url: String,
}

impl MidtransClient {
    pub fn new(client: reqwest::Client, config: &MidtransConfig) -> Self {
        Self {
            client,
            server_key: config.server_key.clone(),
            snap_base_url: config.snap_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a hosted-payment-session for an order.
    ///
    /// The transaction row is only written after this call returns, so a
    /// gateway failure means no local state was created.
    pub async fn create_session(
        &self,
        order_id: &str,
        gross_amount: i64,
        customer: &CustomerDetails,
    ) -> Result<HostedSession> {
        let body = serde_json::json!({
            "transaction_details": {
                "order_id": order_id,
                "gross_amount": gross_amount,
            },
            "customer_details": {
                "first_name": customer.name,
                "email": customer.email,
                "phone": customer.phone,
            },
        });

        let response = self
            .client
            .post(format!("{}/snap/v1/transactions", self.snap_base_url))
            .basic_auth(&self.server_key, None::<&str>)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Gateway API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Gateway API error: {}",
                error_text
            )));
        }

        let session: CreateSnapResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse gateway response: {}", e)))?;

        Ok(HostedSession {
            token: session.token,
            redirect_url: session.redirect_url,
        })
    }
}

impl SignatureVerifier for MidtransClient {
    /// Midtrans signature scheme:
    /// `sha512(order_id + status_code + gross_amount + server_key)`, hex.
    ///
    /// Constant-time comparison so an attacker cannot discover the correct
    /// signature byte-by-byte from response times.
    fn verify_signature(
        &self,
        order_id: &str,
        status_code: &str,
        gross_amount: &str,
        signature: &str,
    ) -> bool {
        let mut hasher = Sha512::new();
        hasher.update(order_id.as_bytes());
        hasher.update(status_code.as_bytes());
        hasher.update(gross_amount.as_bytes());
        hasher.update(self.server_key.as_bytes());
        let expected = hex::encode(hasher.finalize());

        expected.as_bytes().ct_eq(signature.as_bytes()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(server_key: &str) -> MidtransClient {
        MidtransClient::new(
            reqwest::Client::new(),
            &MidtransConfig {
                server_key: server_key.to_string(),
                snap_base_url: "https://app.sandbox.midtrans.com".to_string(),
            },
        )
    }

    fn compute_signature(order_id: &str, status_code: &str, gross_amount: &str, key: &str) -> String {
        let mut hasher = Sha512::new();
        hasher.update(order_id.as_bytes());
        hasher.update(status_code.as_bytes());
        hasher.update(gross_amount.as_bytes());
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    #[test]
    fn test_valid_signature_accepted() {
        let client = test_client("SB-server-key");
        let sig = compute_signature("ORDER-1", "200", "100000.00", "SB-server-key");
        assert!(client.verify_signature("ORDER-1", "200", "100000.00", &sig));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let client = test_client("SB-server-key");
        let sig = compute_signature("ORDER-1", "200", "100000.00", "other-key");
        assert!(!client.verify_signature("ORDER-1", "200", "100000.00", &sig));
    }

    #[test]
    fn test_tampered_amount_rejected() {
        let client = test_client("SB-server-key");
        let sig = compute_signature("ORDER-1", "200", "100000.00", "SB-server-key");
        assert!(!client.verify_signature("ORDER-1", "200", "999999.00", &sig));
    }

    #[test]
    fn test_garbage_signature_rejected() {
        let client = test_client("SB-server-key");
        assert!(!client.verify_signature("ORDER-1", "200", "100000.00", "not-a-signature"));
    }
}
