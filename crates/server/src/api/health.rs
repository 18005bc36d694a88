// Health and liveness routes

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use pulse_core::NotificationService;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common::{ApiError, ApiResponse, ErrorResponse};
use super::AppState;

pub const SERVICE_NAME: &str = "pulse";

/// Connectivity of the service's dependencies
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthDependencies {
    /// "connected" or "disconnected"
    pub store: String,
}

/// Health report
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    pub service: String,
    pub status: String,
    pub version: String,
    pub dependencies: HealthDependencies,
}

impl HealthStatus {
    fn new(healthy: bool) -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            dependencies: HealthDependencies {
                store: if healthy { "connected" } else { "disconnected" }.to_string(),
            },
        }
    }
}

/// Routes served outside the API prefix
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// Health aliases served under the API prefix
pub fn ping_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/ping", get(health))
        .route("/v1/internal/ping", get(health))
}

/// GET /health - Probe the store (also served at /v1/ping and /v1/internal/ping)
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy", body = ApiResponse<HealthStatus>),
        (status = 503, description = "Store unreachable", body = ErrorResponse)
    ),
    tag = "health"
)]
pub async fn health(State(service): State<Arc<NotificationService>>) -> Response {
    match service.check_health().await {
        Ok(()) => ApiResponse::ok("Pulse service is healthy", HealthStatus::new(true)).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            let details = serde_json::json!({
                "reason": e.to_string(),
                "health": HealthStatus::new(false),
            });
            ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Pulse service is unhealthy")
                .with_details(details)
                .into_response()
        }
    }
}
