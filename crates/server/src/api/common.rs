// Common response envelope
//
// Every JSON body has the shape {success, message, data?, error?}.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pulse_core::QueueError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Status used when the client went away before the response was ready
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Successful response wrapper
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    /// Optional structured details
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub error: Option<serde_json::Value>,
}

/// Error returned by handlers
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Map a queue error, using `context` as the message for server-side failures
    pub fn from_queue(err: QueueError, context: &str) -> Self {
        match err {
            QueueError::InvalidInput(reason) => Self::bad_request(reason),
            QueueError::Cancelled => {
                tracing::debug!("Client disconnected before response");
                let status = StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                    .unwrap_or(StatusCode::REQUEST_TIMEOUT);
                Self::new(status, "Request cancelled")
            }
            other => {
                tracing::error!(error = %other, "{}", context);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, context)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            message: self.message,
            error: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::StoreError;

    #[test]
    fn test_queue_error_mapping() {
        let err = ApiError::from_queue(QueueError::InvalidInput("orderId is required".into()), "x");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "orderId is required");

        let err = ApiError::from_queue(
            QueueError::Store(StoreError::Unavailable("down".into())),
            "Failed to retrieve events",
        );
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Failed to retrieve events");

        let err = ApiError::from_queue(QueueError::Cancelled, "x");
        assert_eq!(err.status.as_u16(), CLIENT_CLOSED_REQUEST);
    }

    #[test]
    fn test_envelope_omits_empty_fields() {
        let body = ErrorResponse {
            success: false,
            message: "Invalid event type".into(),
            error: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "message": "Invalid event type"}));
    }
}
