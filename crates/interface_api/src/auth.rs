//! Authentication and authorization

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ApiError;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User's roles
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Missing permission: {0}")]
    MissingPermission(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingPermission(_) => ApiError::Forbidden(err.to_string()),
            _ => ApiError::Unauthorized,
        }
    }
}

/// Creates a new JWT token
///
/// # Arguments
///
/// * `user_id` - User identifier
/// * `roles` - User's roles
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(
    user_id: &str,
    roles: Vec<String>,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: user_id.to_string(),
        roles,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Checks if user has required role
pub fn has_role(claims: &Claims, required_role: &str) -> bool {
    claims.roles.iter().any(|r| r == required_role || r == "admin")
}

/// Fails with [`AuthError::MissingPermission`] unless the role is held
pub fn require_role(claims: &Claims, required_role: &str) -> Result<(), AuthError> {
    if has_role(claims, required_role) {
        Ok(())
    } else {
        Err(AuthError::MissingPermission(required_role.to_string()))
    }
}

/// Permission definitions
pub mod permissions {
    /// Create, edit and delete email providers
    pub const PROVIDER_ADMIN: &str = "provider:admin";
    /// Send email through the provider pool
    pub const EMAIL_SEND: &str = "email:send";
    /// Edit the organisation hierarchy
    pub const HIERARCHY_WRITE: &str = "hierarchy:write";
    /// Decide claims
    pub const CLAIM_APPROVE: &str = "claim:approve";
    /// Manage campaigns and email templates and send campaigns
    pub const CAMPAIGN_MANAGE: &str = "campaign:manage";
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_token_round_trip() {
        let token = create_token("agent-7", vec!["renewals".into()], SECRET, 60).unwrap();
        let claims = validate_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "agent-7");
        assert!(has_role(&claims, "renewals"));
        assert!(!has_role(&claims, permissions::PROVIDER_ADMIN));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token("agent-7", vec![], SECRET, 60).unwrap();
        assert!(matches!(validate_token(&token, "other"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_token() {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "agent-7".into(),
            roles: vec![],
            exp: now - 3600,
            iat: now - 7200,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_admin_holds_every_role() {
        let claims = Claims {
            sub: "root".into(),
            roles: vec!["admin".into()],
            exp: 0,
            iat: 0,
        };
        assert!(require_role(&claims, permissions::CLAIM_APPROVE).is_ok());
    }
}
