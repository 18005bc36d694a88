// Authentication configuration loaded from environment variables.
// Decision: JWT_SECRET is base64-encoded, matching the issuing service
// Decision: AUTH_MODE=none grants an anonymous admin for local development

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Authentication mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Bearer access tokens required
    #[default]
    Jwt,
    /// No authentication (local development)
    None,
}

impl AuthMode {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" | "disabled" => AuthMode::None,
            _ => AuthMode::Jwt,
        }
    }
}

/// Complete authentication configuration
#[derive(Clone)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// Decoded HMAC key
    pub jwt_secret: Vec<u8>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("mode", &self.mode)
            .field("jwt_secret", &"<redacted>")
            .finish()
    }
}

impl AuthConfig {
    /// Configuration for local development: no tokens required
    pub fn disabled() -> Self {
        Self {
            mode: AuthMode::None,
            jwt_secret: Vec::new(),
        }
    }

    /// JWT mode with an already decoded key
    pub fn with_secret(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            mode: AuthMode::Jwt,
            jwt_secret: secret.into(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// - `AUTH_MODE`: `jwt` (default) or `none`
    /// - `JWT_SECRET`: base64-encoded HMAC key, required in jwt mode
    pub fn from_env() -> Result<Self> {
        let mode = std::env::var("AUTH_MODE")
            .map(|s| AuthMode::parse(&s))
            .unwrap_or_default();

        if mode == AuthMode::None {
            tracing::warn!("AUTH_MODE=none: polling routes accept unauthenticated requests");
            return Ok(Self::disabled());
        }

        let encoded = std::env::var("JWT_SECRET")
            .context("JWT_SECRET environment variable required when AUTH_MODE=jwt")?;
        let jwt_secret = decode_secret(&encoded)?;

        Ok(Self {
            mode,
            jwt_secret,
        })
    }
}

/// Decode a base64 HMAC key
pub fn decode_secret(encoded: &str) -> Result<Vec<u8>> {
    let secret = STANDARD
        .decode(encoded.trim())
        .context("JWT_SECRET is not valid base64")?;
    if secret.is_empty() {
        anyhow::bail!("JWT_SECRET must not be empty");
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_mode_parse() {
        assert_eq!(AuthMode::parse("none"), AuthMode::None);
        assert_eq!(AuthMode::parse("NONE"), AuthMode::None);
        assert_eq!(AuthMode::parse("jwt"), AuthMode::Jwt);
        assert_eq!(AuthMode::parse("anything"), AuthMode::Jwt);
    }

    #[test]
    fn test_decode_secret() {
        assert_eq!(decode_secret("c2VjcmV0").unwrap(), b"secret");
        assert!(decode_secret("not base64!").is_err());
        assert!(decode_secret("").is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = AuthConfig::with_secret(b"top-secret".to_vec());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("top-secret"));
    }
}
