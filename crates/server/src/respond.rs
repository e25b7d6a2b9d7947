//! Shared error-to-HTTP mapping. Every failing request gets a correlation
//! id in the logs and a `{ "error": ... }` body; persistence details never
//! reach the client.

use axum::{http::StatusCode, Json};
use panaderia_core::errors::{ApplicationError, InterfaceError};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

impl ApiMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }
}

pub fn failure(error: ApplicationError) -> (StatusCode, Json<ApiError>) {
    let correlation_id = Uuid::new_v4().simple().to_string();
    tracing::warn!(
        event_name = "api.request_failed",
        correlation_id = %correlation_id,
        error = %error,
        "request failed"
    );

    let interface = error.into_interface(correlation_id);
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };

    let error_text = match &interface {
        // Validation and lookup failures are already phrased for the caller.
        InterfaceError::BadRequest { message, .. }
        | InterfaceError::Conflict { message, .. }
        | InterfaceError::NotFound { message, .. } => message.clone(),
        InterfaceError::ServiceUnavailable { .. } => interface.user_message().to_string(),
    };

    (status, Json(ApiError { error: error_text }))
}

pub fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (StatusCode::BAD_REQUEST, Json(ApiError { error: message.into() }))
}

pub fn unauthorized(message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (StatusCode::UNAUTHORIZED, Json(ApiError { error: message.into() }))
}
