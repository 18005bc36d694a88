// Authentication extractors
// Decision: Token lookup order is Authorization header, `token` query param, `token` cookie
// Decision: In "none" mode, every request is an anonymous admin

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use super::{
    config::{AuthConfig, AuthMode},
    jwt::{JwtService, TokenError, ADMIN_ROLE},
};
use crate::api::common::ApiError;

const TOKEN_PARAM: &str = "token";

/// Authentication error
#[derive(Debug, Clone)]
pub struct AuthError {
    pub message: String,
    pub status: StatusCode,
}

impl AuthError {
    pub fn unauthorized(message: &str) -> Self {
        Self {
            message: message.to_string(),
            status: StatusCode::UNAUTHORIZED,
        }
    }

    pub fn forbidden(message: &str) -> Self {
        Self {
            message: message.to_string(),
            status: StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::new(self.status, self.message).into_response()
    }
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub role: String,
}

impl AuthUser {
    /// Caller used when authentication is disabled
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            role: ADMIN_ROLE.to_string(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// Authenticated caller holding the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// Auth state shared across routes
#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub jwt_service: Arc<JwtService>,
}

impl AuthState {
    pub fn new(config: AuthConfig) -> Self {
        let jwt_service = Arc::new(JwtService::new(&config.jwt_secret));
        Self {
            config,
            jwt_service,
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);
        extract_auth_user(parts, &auth_state)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AuthError::forbidden("Admin access required"));
        }
        Ok(AdminUser(user))
    }
}

fn extract_auth_user(parts: &Parts, auth_state: &AuthState) -> Result<AuthUser, AuthError> {
    if auth_state.config.mode == AuthMode::None {
        return Ok(AuthUser::anonymous());
    }

    let token =
        extract_token(parts).ok_or_else(|| AuthError::unauthorized("Missing authentication token"))?;

    let claims = auth_state
        .jwt_service
        .validate_access_token(&token)
        .map_err(|e| {
            tracing::debug!("JWT validation failed: {}", e);
            match e {
                TokenError::WrongType(_) => {
                    AuthError::unauthorized("Invalid token type, expected access token")
                }
                TokenError::Invalid(_) => AuthError::unauthorized("Invalid or expired token"),
            }
        })?;

    if claims.sub.is_empty() {
        return Err(AuthError::unauthorized("Unauthorized access"));
    }

    Ok(AuthUser {
        user_id: claims.sub,
        role: claims.role,
    })
}

fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        let mut pieces = value.split_whitespace();
        if let (Some(scheme), Some(token), None) = (pieces.next(), pieces.next(), pieces.next()) {
            if scheme.eq_ignore_ascii_case("bearer") {
                return Some(token.to_string());
            }
        }
    }

    if let Some(token) = parts.uri.query().and_then(token_from_query) {
        return Some(token);
    }

    CookieJar::from_headers(&parts.headers)
        .get(TOKEN_PARAM)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

fn token_from_query(query: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == TOKEN_PARAM)
        .map(|(_, value)| value.to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_token_from_bearer_header() {
        let p = parts(Request::builder().header("Authorization", "bearer abc.def"));
        assert_eq!(extract_token(&p).as_deref(), Some("abc.def"));

        let p = parts(Request::builder().header("Authorization", "Basic abc"));
        assert_eq!(extract_token(&p), None);
    }

    #[test]
    fn test_token_from_query_and_cookie() {
        let p = parts(Request::builder().uri("/v1/polling/events?longPoll=true&token=q.t"));
        assert_eq!(extract_token(&p).as_deref(), Some("q.t"));

        let p = parts(Request::builder().header("Cookie", "theme=dark; token=c.t"));
        assert_eq!(extract_token(&p).as_deref(), Some("c.t"));

        let p = parts(Request::builder().uri("/v1/polling/events?token="));
        assert_eq!(extract_token(&p), None);
    }

    #[test]
    fn test_disabled_auth_is_anonymous_admin() {
        let state = AuthState::new(AuthConfig::disabled());
        let user = extract_auth_user(&parts(Request::builder()), &state).unwrap();
        assert!(user.is_admin());
    }

    #[test]
    fn test_missing_token_rejected() {
        let state = AuthState::new(AuthConfig::with_secret(b"k".to_vec()));
        let err = extract_auth_user(&parts(Request::builder()), &state).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "Missing authentication token");
    }
}
