// Authentication
//
// Polling routes authenticate with an HS256 access token. The token may come
// from the Authorization header, a `token` query parameter or a `token` cookie.

pub mod config;
pub mod jwt;
pub mod middleware;

pub use config::{AuthConfig, AuthMode};
pub use jwt::{AccessTokenClaims, JwtService, ACCESS_TOKEN_TYPE, ADMIN_ROLE};
pub use middleware::{AdminUser, AuthError, AuthState, AuthUser};
