// Internal publish HTTP routes
// Decision: Publish routes are for trusted backend services and do not authenticate
// Decision: Event type and action arrive as strings so unknown values map to a 400 envelope

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use pulse_core::{
    EventAction, EventType, Metadata, NotificationService, PublishOutcome, PublishRequest,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common::{ApiError, ApiResponse, ErrorResponse};
use super::AppState;

/// Body of the generic publish route
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublishEventBody {
    /// One of the known event types, e.g. "CUSTOMER_ORDER_STATUS"
    pub event_type: String,
    /// One of the known actions, e.g. "REFRESH"
    pub action: String,
    pub entity_id: String,
    pub entity_type: String,
    /// Recipient user; the admin queue when absent
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusChangeBody {
    pub order_id: String,
    pub user_id: String,
    pub new_status: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderBody {
    pub order_id: String,
    pub customer_name: String,
    /// Decimal amount as a string, e.g. "149.90"
    pub total_amount: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdateBody {
    pub order_id: String,
    pub update_type: String,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Metadata>,
}

/// How the event was handed to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Queued for a background write
    Dispatched,
    /// Written before the response was sent
    Written,
}

/// Publish acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublishAck {
    pub delivery: Delivery,
}

impl From<PublishOutcome> for PublishAck {
    fn from(outcome: PublishOutcome) -> Self {
        let delivery = match outcome {
            PublishOutcome::Dispatched => Delivery::Dispatched,
            PublishOutcome::Written => Delivery::Written,
        };
        Self { delivery }
    }
}

/// Create internal publish routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/internal/events/publish", post(publish_event))
        .route(
            "/v1/internal/events/order-status-change",
            post(publish_order_status_change),
        )
        .route("/v1/internal/events/new-order", post(publish_new_order))
        .route("/v1/internal/events/order-update", post(publish_order_update))
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(b)| b).map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected publish body");
        ApiError::bad_request("Invalid request body")
    })
}

/// POST /v1/internal/events/publish - Publish an arbitrary event
#[utoipa::path(
    post,
    path = "/v1/internal/events/publish",
    request_body = PublishEventBody,
    responses(
        (status = 200, description = "Event published", body = ApiResponse<PublishAck>),
        (status = 400, description = "Invalid body, event type or action", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    ),
    tag = "publish"
)]
pub async fn publish_event(
    State(service): State<Arc<NotificationService>>,
    body: Result<Json<PublishEventBody>, JsonRejection>,
) -> Result<ApiResponse<PublishAck>, ApiError> {
    let body = parse_body(body)?;

    let event_type: EventType = body
        .event_type
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid event type"))?;
    let action: EventAction = body
        .action
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid action"))?;

    let request = PublishRequest {
        event_type,
        action,
        entity_id: body.entity_id,
        entity_type: body.entity_type,
        user_id: body.user_id,
        metadata: body.metadata.unwrap_or_default(),
    };

    let outcome = service
        .publish(request)
        .await
        .map_err(|e| ApiError::from_queue(e, "Failed to publish event"))?;
    Ok(ApiResponse::ok("Event published successfully", outcome.into()))
}

/// POST /v1/internal/events/order-status-change - Notify a customer of an order status change
#[utoipa::path(
    post,
    path = "/v1/internal/events/order-status-change",
    request_body = OrderStatusChangeBody,
    responses(
        (status = 200, description = "Event published", body = ApiResponse<PublishAck>),
        (status = 400, description = "Invalid body", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    ),
    tag = "publish"
)]
pub async fn publish_order_status_change(
    State(service): State<Arc<NotificationService>>,
    body: Result<Json<OrderStatusChangeBody>, JsonRejection>,
) -> Result<ApiResponse<PublishAck>, ApiError> {
    let body = parse_body(body)?;
    let outcome = service
        .publish_order_status_change(&body.order_id, &body.user_id, &body.new_status)
        .await
        .map_err(|e| ApiError::from_queue(e, "Failed to publish event"))?;
    Ok(ApiResponse::ok("Order status change event published", outcome.into()))
}

/// POST /v1/internal/events/new-order - Notify admins of a new order
#[utoipa::path(
    post,
    path = "/v1/internal/events/new-order",
    request_body = NewOrderBody,
    responses(
        (status = 200, description = "Event published", body = ApiResponse<PublishAck>),
        (status = 400, description = "Invalid body", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    ),
    tag = "publish"
)]
pub async fn publish_new_order(
    State(service): State<Arc<NotificationService>>,
    body: Result<Json<NewOrderBody>, JsonRejection>,
) -> Result<ApiResponse<PublishAck>, ApiError> {
    let body = parse_body(body)?;
    let outcome = service
        .publish_new_order(&body.order_id, &body.customer_name, &body.total_amount)
        .await
        .map_err(|e| ApiError::from_queue(e, "Failed to publish event"))?;
    Ok(ApiResponse::ok("New order event published", outcome.into()))
}

/// POST /v1/internal/events/order-update - Notify admins of an order update
#[utoipa::path(
    post,
    path = "/v1/internal/events/order-update",
    request_body = OrderUpdateBody,
    responses(
        (status = 200, description = "Event published", body = ApiResponse<PublishAck>),
        (status = 400, description = "Invalid body", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    ),
    tag = "publish"
)]
pub async fn publish_order_update(
    State(service): State<Arc<NotificationService>>,
    body: Result<Json<OrderUpdateBody>, JsonRejection>,
) -> Result<ApiResponse<PublishAck>, ApiError> {
    let body = parse_body(body)?;
    let outcome = service
        .publish_order_update(&body.order_id, &body.update_type, body.details)
        .await
        .map_err(|e| ApiError::from_queue(e, "Failed to publish event"))?;
    Ok(ApiResponse::ok("Order update event published", outcome.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_body_accepts_missing_optionals() {
        let body: PublishEventBody = serde_json::from_value(serde_json::json!({
            "eventType": "SYSTEM_NOTIFICATION",
            "action": "NO_ACTION",
            "entityId": "sys-1",
            "entityType": "SYSTEM"
        }))
        .unwrap();
        assert!(body.user_id.is_none());
        assert!(body.metadata.is_none());
    }

    #[test]
    fn test_ack_wire_format() {
        let ack = PublishAck::from(PublishOutcome::Dispatched);
        assert_eq!(
            serde_json::to_value(ack).unwrap(),
            serde_json::json!({"delivery": "dispatched"})
        );
    }
}
