use axum::extract::{Path, State};
use serde_json::json;

use crate::error::{ApiError, ErrorResponse};
use crate::models::GetResponse;
use crate::response::{self, Envelope};
use crate::routes;
use crate::state::AppState;

/// GET /items/:beaconid handler - Fetch a single item
#[utoipa::path(
    get,
    path = routes::ITEM,
    params(
        ("beaconid" = String, Path, description = "Key of the item")
    ),
    responses(
        (status = 200, description = "Item found", body = GetResponse),
        (status = 400, description = "Missing key", body = ErrorResponse),
        (status = 404, description = "Item not found", body = ErrorResponse),
        (status = 500, description = "Store error", body = ErrorResponse)
    ),
    tag = "items"
)]
pub async fn get_handler(
    State(state): State<AppState>,
    Path(beaconid): Path<String>,
) -> Result<Envelope, ApiError> {
    if beaconid.is_empty() {
        return Err(ApiError::validation("Beacon ID is required"));
    }

    match state
        .store
        .get(&beaconid)
        .await
        .map_err(|e| ApiError::store("Failed to get item", e))?
    {
        Some(item) => {
            tracing::info!("Fetched item with beaconid: {}", beaconid);
            Ok(response::success(json!({ "item": item })))
        }
        None => Err(ApiError::NotFound),
    }
}
