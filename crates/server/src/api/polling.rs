// Polling HTTP routes
// Decision: Type-filtered polls that resolve to the admin queue require the admin role
// Decision: Client disconnect cancels a long poll through a DropGuard on the handler future

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use pulse_core::{EventType, NotificationService, PollRequest, PollResponse, QueueError, SubjectKey};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use utoipa::IntoParams;

use super::common::{ApiError, ApiResponse, ErrorResponse};
use super::AppState;
use crate::auth::{AdminUser, AuthUser};

/// Query parameters for polling
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PollParams {
    /// Only return events of this type
    pub event_type: Option<String>,
    /// Last event id the client has seen
    pub last_event_id: Option<String>,
    /// Block until events arrive or the long-poll timeout passes
    #[serde(default)]
    pub long_poll: bool,
}

/// Query parameters for the user and admin polling routes
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CursorParams {
    /// Last event id the client has seen
    pub last_event_id: Option<String>,
    /// Block until events arrive or the long-poll timeout passes
    #[serde(default)]
    pub long_poll: bool,
}

/// Create polling routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/polling/events", get(poll_events))
        .route("/v1/polling/user/events", get(poll_user_events))
        .route("/v1/polling/admin/events", get(poll_admin_events))
}

/// GET /v1/polling/events - Poll the caller's events, optionally filtered by type
#[utoipa::path(
    get,
    path = "/v1/polling/events",
    params(PollParams),
    responses(
        (status = 200, description = "Events retrieved", body = ApiResponse<PollResponse>),
        (status = 400, description = "Invalid parameters or event type", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Filter requires admin role", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "polling"
)]
pub async fn poll_events(
    State(service): State<Arc<NotificationService>>,
    user: AuthUser,
    params: Result<Query<PollParams>, QueryRejection>,
) -> Result<ApiResponse<PollResponse>, ApiError> {
    let Query(params) = params.map_err(|_| ApiError::bad_request("Invalid request parameters"))?;

    let event_type = match params.event_type.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<EventType>()
                .map_err(|_| ApiError::bad_request("Invalid event type"))?,
        ),
    };

    let subject = match event_type {
        Some(event_type) => SubjectKey::for_type_filter(event_type, Some(&user.user_id)),
        None => SubjectKey::user(&user.user_id),
    };
    if subject.is_admin() && !user.is_admin() {
        return Err(ApiError::new(StatusCode::FORBIDDEN, "Admin access required"));
    }

    let request = PollRequest::new(subject)
        .with_event_type(event_type)
        .with_last_event_id(params.last_event_id)
        .with_long_poll(params.long_poll);

    let response = run_poll(&service, request)
        .await
        .map_err(|e| ApiError::from_queue(e, "Failed to retrieve events"))?;
    Ok(ApiResponse::ok("Events retrieved", response))
}

/// GET /v1/polling/user/events - Poll the caller's own queue
#[utoipa::path(
    get,
    path = "/v1/polling/user/events",
    params(CursorParams),
    responses(
        (status = 200, description = "User events retrieved", body = ApiResponse<PollResponse>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "polling"
)]
pub async fn poll_user_events(
    State(service): State<Arc<NotificationService>>,
    user: AuthUser,
    params: Result<Query<CursorParams>, QueryRejection>,
) -> Result<ApiResponse<PollResponse>, ApiError> {
    let Query(params) = params.map_err(|_| ApiError::bad_request("Invalid request parameters"))?;

    let request = PollRequest::new(SubjectKey::user(&user.user_id))
        .with_last_event_id(params.last_event_id)
        .with_long_poll(params.long_poll);

    let response = run_poll(&service, request)
        .await
        .map_err(|e| ApiError::from_queue(e, "Failed to retrieve events"))?;
    Ok(ApiResponse::ok("User events retrieved", response))
}

/// GET /v1/polling/admin/events - Poll the shared admin queue
#[utoipa::path(
    get,
    path = "/v1/polling/admin/events",
    params(CursorParams),
    responses(
        (status = 200, description = "Admin events retrieved", body = ApiResponse<PollResponse>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "polling"
)]
pub async fn poll_admin_events(
    State(service): State<Arc<NotificationService>>,
    _admin: AdminUser,
    params: Result<Query<CursorParams>, QueryRejection>,
) -> Result<ApiResponse<PollResponse>, ApiError> {
    let Query(params) = params.map_err(|_| ApiError::bad_request("Invalid request parameters"))?;

    let request = PollRequest::new(SubjectKey::Admin)
        .with_last_event_id(params.last_event_id)
        .with_long_poll(params.long_poll);

    let response = run_poll(&service, request)
        .await
        .map_err(|e| ApiError::from_queue(e, "Failed to retrieve events"))?;
    Ok(ApiResponse::ok("Admin events retrieved", response))
}

/// Serve a poll whose cancellation is tied to this handler's lifetime
async fn run_poll(
    service: &NotificationService,
    request: PollRequest,
) -> Result<PollResponse, QueueError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    service.poll_events(request, &cancel).await
}
