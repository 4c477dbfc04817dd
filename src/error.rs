use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::response;

/// Error response body shape shared by all endpoints
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response type for health check endpoint
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Response type for unhealthy status
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct UnhealthyResponse {
    pub status: String,
    pub error: String,
}

/// Error taxonomy for the API endpoints.
///
/// Validation failures never reach the store and map to 400; a missing
/// record maps to 404; any store-layer failure maps to 500 carrying the
/// handler's message plus the underlying cause's message. Rendering goes
/// through the response envelope so every error response has the same
/// header set as a success.
#[derive(Debug)]
pub enum ApiError {
    /// Missing required field, path parameter, or body
    Validation(String),
    /// Key absent at read/update/delete time
    NotFound,
    /// Failure from the backing store
    Store {
        message: &'static str,
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn store(message: &'static str, source: anyhow::Error) -> Self {
        ApiError::Store { message, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = match self {
            ApiError::Validation(message) => {
                tracing::debug!("Validation failed: {}", message);
                response::error(StatusCode::BAD_REQUEST, &message, None)
            }
            ApiError::NotFound => {
                tracing::debug!("Item not found");
                response::error(StatusCode::NOT_FOUND, "Item not found", None)
            }
            ApiError::Store { message, source } => {
                tracing::error!("{}: {:#}", message, source);
                response::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    message,
                    Some(source.to_string()),
                )
            }
        };
        envelope.into_response()
    }
}
