//! JWT authentication.
//!
//! Identity verification is deliberately thin: tokens are HS256-signed,
//! carry the user id as `sub` plus a role claim, and are validated by an
//! axum middleware layer that inserts an [`AuthUser`] into request
//! extensions. Handlers do their own role and ownership checks.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jwt_simple::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::models::UserRole;

/// Custom claims carried next to the standard ones (sub, iat, exp).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthClaims {
    pub role: UserRole,
}

/// The verified caller identity, available to handlers via extensions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn require_role(&self, role: UserRole) -> Result<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("Requires {} role", role)))
        }
    }
}

/// Issue a token for a user. Used by the dev seeder and by tests; a real
/// deployment fronts this service with its identity provider.
pub fn issue_token(key: &HS256Key, user_id: &str, role: UserRole) -> Result<String> {
    let claims = Claims::with_custom_claims(AuthClaims { role }, Duration::from_hours(24))
        .with_subject(user_id);
    key.authenticate(claims)
        .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

/// Verify a bearer token and return the caller identity.
pub fn verify_token(key: &HS256Key, token: &str) -> Result<AuthUser> {
    let claims = key
        .verify_token::<AuthClaims>(token, None)
        .map_err(|_| AppError::Unauthorized)?;

    let user_id = claims.subject.ok_or(AppError::Unauthorized)?;

    Ok(AuthUser {
        user_id,
        role: claims.custom.role,
    })
}

/// Middleware: require a valid bearer token on the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;

    let user = verify_token(&state.jwt_key, token)?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let key = HS256Key::from_bytes(b"test-secret");
        let token = issue_token(&key, "tb_usr_abc", UserRole::Student).expect("sign");
        let user = verify_token(&key, &token).expect("verify");
        assert_eq!(user.user_id, "tb_usr_abc");
        assert_eq!(user.role, UserRole::Student);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let key = HS256Key::from_bytes(b"test-secret");
        let other = HS256Key::from_bytes(b"other-secret");
        let token = issue_token(&key, "tb_usr_abc", UserRole::Admin).expect("sign");
        assert!(verify_token(&other, &token).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let key = HS256Key::from_bytes(b"test-secret");
        assert!(verify_token(&key, "not.a.token").is_err());
    }
}
