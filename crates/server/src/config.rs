// Server configuration loaded from environment variables
// Decision: PostgreSQL is the default store; the in-memory store is for local runs only
// Decision: CORS defaults mirror the request origin ("*") so browsers can poll with credentials

use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::http::{HeaderName, HeaderValue, Method};

/// Which EventLog backend to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

impl StoreBackend {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => bail!("unknown STORE_BACKEND: {other}"),
        }
    }
}

/// Database pool settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Cross-origin settings
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins; "*" mirrors the request origin
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<Method>,
    pub allowed_headers: Vec<HeaderName>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: parse_list("GET,POST,PUT,DELETE,OPTIONS"),
            allowed_headers: parse_list("Origin,Content-Type,Authorization"),
        }
    }
}

impl CorsConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }

    pub fn origin_values(&self) -> Vec<HeaderValue> {
        self.allowed_origins
            .iter()
            .filter(|o| o.as_str() != "*")
            .filter_map(|o| o.parse().ok())
            .collect()
    }
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub store_backend: StoreBackend,
    /// Present when the backend is PostgreSQL
    pub database: Option<DatabaseConfig>,
    pub cors: CorsConfig,
    /// Interval between sweeps of expired queues
    pub purge_interval: Duration,
    /// Prefix for the versioned API routes (e.g. "/api")
    pub api_prefix: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `PORT`: listen port (default: 9001)
    /// - `STORE_BACKEND`: `postgres` or `memory` (default: postgres)
    /// - `DATABASE_URL`: required for the postgres backend
    /// - `DATABASE_MAX_CONNECTIONS` / `DATABASE_MIN_CONNECTIONS`: pool bounds (50 / 10)
    /// - `QUEUE_PURGE_INTERVAL_SECS`: expired queue sweep interval (default: 60)
    /// - `CORS_ALLOWED_ORIGINS`, `CORS_ALLOWED_METHODS`, `CORS_ALLOWED_HEADERS`: comma-separated
    /// - `API_PREFIX`: route prefix (default: none)
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(p) => p.parse().with_context(|| format!("invalid PORT: {p}"))?,
            Err(_) => 9001,
        };

        let store_backend = std::env::var("STORE_BACKEND")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| StoreBackend::parse(&s))
            .transpose()?
            .unwrap_or_default();

        let database = match store_backend {
            StoreBackend::Memory => None,
            StoreBackend::Postgres => Some(DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .context("DATABASE_URL environment variable required")?,
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS").unwrap_or(50),
                min_connections: env_parse("DATABASE_MIN_CONNECTIONS").unwrap_or(10),
            }),
        };

        let defaults = CorsConfig::default();
        let cors = CorsConfig {
            allowed_origins: env_list("CORS_ALLOWED_ORIGINS")
                .map(|s| split_list(&s).map(str::to_string).collect())
                .unwrap_or(defaults.allowed_origins),
            allowed_methods: env_list("CORS_ALLOWED_METHODS")
                .map(|s| parse_list(&s))
                .unwrap_or(defaults.allowed_methods),
            allowed_headers: env_list("CORS_ALLOWED_HEADERS")
                .map(|s| parse_list(&s))
                .unwrap_or(defaults.allowed_headers),
        };

        Ok(Self {
            port,
            store_backend,
            database,
            cors,
            purge_interval: Duration::from_secs(
                env_parse::<u64>("QUEUE_PURGE_INTERVAL_SECS")
                    .filter(|secs| *secs > 0)
                    .unwrap_or(60),
            ),
            api_prefix: std::env::var("API_PREFIX").unwrap_or_default(),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_list(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_list<T: std::str::FromStr>(s: &str) -> Vec<T> {
    split_list(s).filter_map(|s| s.parse().ok()).collect()
}
