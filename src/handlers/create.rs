use axum::body::Bytes;
use axum::extract::State;
use serde_json::{json, Value as JsonValue};

use crate::error::{ApiError, ErrorResponse};
use crate::models::{generate_beaconid, now_rfc3339, MutationResponse, CREATED_AT, KEY_FIELD, UPDATED_AT};
use crate::response::{self, Envelope};
use crate::state::AppState;

/// POST /items handler - Create an item
///
/// Requires a `name`; generates a key when the caller does not supply one.
/// Creation and update timestamps are stamped server-side and equal at
/// creation. The write is unconditional: a caller-supplied key that already
/// exists is overwritten, there is no uniqueness check.
#[utoipa::path(
    post,
    path = "/items",
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Item created", body = MutationResponse),
        (status = 400, description = "Missing body or name", body = ErrorResponse),
        (status = 500, description = "Store error", body = ErrorResponse)
    ),
    tag = "items"
)]
pub async fn create_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Envelope, ApiError> {
    if body.is_empty() {
        return Err(ApiError::validation("Request body is required"));
    }
    let parsed: JsonValue = serde_json::from_slice(&body)
        .map_err(|_| ApiError::validation("Request body must be valid JSON"))?;
    let fields = parsed.as_object().cloned().unwrap_or_default();

    let name = fields.get("name").and_then(JsonValue::as_str).unwrap_or("");
    if name.is_empty() {
        return Err(ApiError::validation("Name is required"));
    }

    let beaconid = fields
        .get(KEY_FIELD)
        .and_then(JsonValue::as_str)
        .map(str::to_owned)
        .unwrap_or_else(generate_beaconid);
    let now = now_rfc3339();

    let mut item = fields;
    item.insert(KEY_FIELD.to_string(), JsonValue::String(beaconid.clone()));
    if matches!(item.get("description"), None | Some(JsonValue::Null)) {
        item.insert("description".to_string(), JsonValue::String(String::new()));
    }
    item.insert(CREATED_AT.to_string(), JsonValue::String(now.clone()));
    item.insert(UPDATED_AT.to_string(), JsonValue::String(now));

    state
        .store
        .put(item.clone())
        .await
        .map_err(|e| ApiError::store("Failed to create item", e))?;

    tracing::info!("Created item with beaconid: {}", beaconid);
    Ok(response::success(json!({
        "message": "Item created successfully",
        "item": item,
    })))
}
