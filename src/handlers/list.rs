use anyhow::Context;
use axum::extract::{Query, State};
use serde_json::{json, Value as JsonValue};

use crate::error::{ApiError, ErrorResponse};
use crate::models::{ListQuery, ListResponse};
use crate::response::{self, Envelope};
use crate::state::AppState;

/// GET /items handler - Enumerate the whole table
///
/// Query parameters:
/// - limit: page size (optional)
/// - lastKey: continuation token from a previous page (optional). The token
///   is the URL-encoded JSON of the store's native cursor; pass it back
///   verbatim.
///
/// Full-table scan semantics: no filtering, no sort order guarantee beyond
/// the store's native enumeration order.
#[utoipa::path(
    get,
    path = "/items",
    params(
        ("limit" = Option<i64>, Query, description = "Maximum number of items to return"),
        ("lastKey" = Option<String>, Query, description = "Continuation token from a previous page")
    ),
    responses(
        (status = 200, description = "One page of items", body = ListResponse),
        (status = 500, description = "Store error", body = ErrorResponse)
    ),
    tag = "items"
)]
pub async fn list_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Envelope, ApiError> {
    let limit = query.limit.filter(|limit| *limit > 0);

    let start_key = query
        .last_key
        .as_deref()
        .map(decode_last_key)
        .transpose()
        .map_err(|e| ApiError::store("Failed to list items", e))?;

    let page = state
        .store
        .scan(limit, start_key.as_ref())
        .await
        .map_err(|e| ApiError::store("Failed to list items", e))?;

    let last_evaluated_key = page.last_evaluated_key.map(|cursor| encode_last_key(&cursor));

    tracing::info!(
        "Listed {} items (scanned: {}, limit: {:?})",
        page.count,
        page.scanned_count,
        limit
    );

    Ok(response::success(json!({
        "items": page.items,
        "count": page.count,
        "scannedCount": page.scanned_count,
        "lastEvaluatedKey": last_evaluated_key,
    })))
}

fn decode_last_key(token: &str) -> anyhow::Result<JsonValue> {
    let decoded = urlencoding::decode(token).context("continuation token is not valid UTF-8")?;
    serde_json::from_str(&decoded).context("continuation token is not valid JSON")
}

fn encode_last_key(cursor: &JsonValue) -> String {
    urlencoding::encode(&cursor.to_string()).into_owned()
}
