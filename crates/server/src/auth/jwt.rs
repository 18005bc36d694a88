// JWT access token validation
// Decision: Accept any HMAC algorithm (HS256/384/512) with the shared key
// Decision: exp is checked when present but not required

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Expected value of the `type` claim
pub const ACCESS_TOKEN_TYPE: &str = "access_token";

/// Role granting access to the admin queue
pub const ADMIN_ROLE: &str = "ADMIN";

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Token type
    #[serde(rename = "type")]
    pub token_type: String,
    /// User role
    #[serde(default)]
    pub role: String,
    /// Expiration time (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Issued at (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Token validation failure
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid or expired token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("unexpected token type: {0}")]
    WrongType(String),
}

/// JWT service for token validation
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Validate and decode an access token
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        let token_data = decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)?;

        if token_data.claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(TokenError::WrongType(token_data.claims.token_type));
        }

        Ok(token_data.claims)
    }

    /// Issue an access token (used by tooling and tests)
    pub fn generate_access_token(
        &self,
        user_id: &str,
        role: &str,
        lifetime: chrono::Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            role: role.to_string(),
            exp: Some((now + lifetime).timestamp()),
            iat: Some(now.timestamp()),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .context("Failed to encode access token")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(b"test-secret-key")
    }

    #[test]
    fn test_generate_and_validate() {
        let jwt = service();
        let token = jwt
            .generate_access_token("U1", ADMIN_ROLE, chrono::Duration::minutes(15))
            .unwrap();

        let claims = jwt.validate_access_token(&token).unwrap();
        assert_eq!(claims.sub, "U1");
        assert_eq!(claims.role, ADMIN_ROLE);
        assert_eq!(claims.token_type, ACCESS_TOKEN_TYPE);
    }

    #[test]
    fn test_expired_token_rejected() {
        let jwt = service();
        let token = jwt
            .generate_access_token("U1", "CUSTOMER", chrono::Duration::hours(-1))
            .unwrap();
        assert!(matches!(
            jwt.validate_access_token(&token),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let token = service()
            .generate_access_token("U1", "CUSTOMER", chrono::Duration::minutes(5))
            .unwrap();
        let other = JwtService::new(b"another-key");
        assert!(other.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_refresh_token_type_rejected() {
        let jwt = service();
        let claims = AccessTokenClaims {
            sub: "U1".into(),
            token_type: "refresh_token".into(),
            role: String::new(),
            exp: None,
            iat: None,
        };
        let token = encode(&Header::default(), &claims, &jwt.encoding_key).unwrap();
        assert!(matches!(
            jwt.validate_access_token(&token),
            Err(TokenError::WrongType(_))
        ));
    }

    #[test]
    fn test_token_without_exp_accepted() {
        let jwt = service();
        let claims = AccessTokenClaims {
            sub: "U2".into(),
            token_type: ACCESS_TOKEN_TYPE.into(),
            role: "CUSTOMER".into(),
            exp: None,
            iat: None,
        };
        let token = encode(&Header::new(Algorithm::HS512), &claims, &jwt.encoding_key).unwrap();
        assert_eq!(jwt.validate_access_token(&token).unwrap().sub, "U2");
    }
}
