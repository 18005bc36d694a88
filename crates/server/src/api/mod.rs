// HTTP API routes
//
// Polling routes authenticate the caller; internal publish routes are meant for
// trusted backend services. Health stays outside the API prefix.

pub mod common;
pub mod health;
pub mod polling;
pub mod publish;

use std::sync::Arc;

use axum::{extract::FromRef, Router};
use pulse_core::{Event, EventAction, EventType, NotificationService, PollResponse};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::AuthState;
use crate::config::CorsConfig;

pub use common::{ApiError, ApiResponse, ErrorResponse};

/// App state shared across routes
#[derive(Clone, FromRef)]
pub struct AppState {
    pub service: Arc<NotificationService>,
    pub auth: AuthState,
}

impl AppState {
    pub fn new(service: Arc<NotificationService>, auth: AuthState) -> Self {
        Self { service, auth }
    }
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        polling::poll_events,
        polling::poll_user_events,
        polling::poll_admin_events,
        publish::publish_event,
        publish::publish_order_status_change,
        publish::publish_new_order,
        publish::publish_order_update,
        health::health,
    ),
    components(
        schemas(
            Event, EventType, EventAction, PollResponse,
            ApiResponse<PollResponse>,
            ErrorResponse,
            publish::PublishEventBody,
            publish::OrderStatusChangeBody,
            publish::NewOrderBody,
            publish::OrderUpdateBody,
            publish::PublishAck,
            publish::Delivery,
            ApiResponse<publish::PublishAck>,
            health::HealthStatus,
            health::HealthDependencies,
            ApiResponse<health::HealthStatus>,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "polling", description = "Event polling endpoints"),
        (name = "publish", description = "Internal event publishing endpoints"),
        (name = "health", description = "Health and liveness endpoints")
    ),
    info(
        title = "Pulse API",
        description = "Per-user and admin notification queues served over short and long polling"
    )
)]
pub struct ApiDoc;

/// Build router with optional API prefix
pub fn build_router_with_prefix<S: Clone + Send + Sync + 'static>(
    api_routes: Router<S>,
    api_prefix: &str,
) -> Router<S> {
    if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(api_prefix, api_routes)
    }
}

/// CORS layer for the configured origins
pub fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let origin = if cors.allows_any_origin() {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(cors.origin_values())
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(cors.allowed_methods.clone())
        .allow_headers(cors.allowed_headers.clone())
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Assemble the full application
pub fn build_app(state: AppState, api_prefix: &str, cors: &CorsConfig) -> Router {
    let api_routes = Router::new()
        .merge(polling::routes())
        .merge(publish::routes())
        .merge(health::ping_routes());

    Router::new()
        .merge(health::routes())
        .merge(build_router_with_prefix(api_routes, api_prefix))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(cors_layer(cors))
        .layer(TraceLayer::new_for_http())
}
