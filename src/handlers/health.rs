use axum::extract::State;
use axum::http::StatusCode;
use serde_json::json;

use crate::error::{HealthResponse, UnhealthyResponse};
use crate::response::{self, Envelope};
use crate::routes;
use crate::state::AppState;

/// GET /health handler - Health check endpoint
///
/// Probes the backing store and returns 200 OK if it is reachable,
/// 503 Service Unavailable otherwise.
#[utoipa::path(
    get,
    path = routes::HEALTH,
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = UnhealthyResponse)
    ),
    tag = "health"
)]
pub async fn health_handler(State(state): State<AppState>) -> Envelope {
    match state.store.health_check().await {
        Ok(()) => {
            tracing::debug!("Health check passed");
            response::success(json!({ "status": "healthy" }))
        }
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            Envelope::new(
                StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "status": "unhealthy",
                    "error": format!("Cannot reach the item store: {}", e),
                }),
            )
        }
    }
}
