use axum::extract::{Path, State};
use serde_json::json;

use crate::error::{ApiError, ErrorResponse};
use crate::models::DeleteResponse;
use crate::response::{self, Envelope};
use crate::routes;
use crate::state::AppState;

/// DELETE /items/:beaconid handler - Remove an item
///
/// Checks existence with a separate read first and reports 404 if the key
/// is absent. The check and the delete are not atomic; a concurrent delete
/// between the two can make a real deletion report "not found".
#[utoipa::path(
    delete,
    path = routes::ITEM,
    params(
        ("beaconid" = String, Path, description = "Key of the item")
    ),
    responses(
        (status = 200, description = "Item deleted", body = DeleteResponse),
        (status = 400, description = "Missing key", body = ErrorResponse),
        (status = 404, description = "Item not found", body = ErrorResponse),
        (status = 500, description = "Store error", body = ErrorResponse)
    ),
    tag = "items"
)]
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(beaconid): Path<String>,
) -> Result<Envelope, ApiError> {
    if beaconid.is_empty() {
        return Err(ApiError::validation("Beacon ID is required"));
    }

    let existing = state
        .store
        .get(&beaconid)
        .await
        .map_err(|e| ApiError::store("Failed to delete item", e))?;
    if existing.is_none() {
        return Err(ApiError::NotFound);
    }

    state
        .store
        .delete(&beaconid)
        .await
        .map_err(|e| ApiError::store("Failed to delete item", e))?;

    tracing::info!("Deleted item with beaconid: {}", beaconid);
    Ok(response::success(json!({
        "message": "Item deleted successfully",
        "beaconid": beaconid,
    })))
}
