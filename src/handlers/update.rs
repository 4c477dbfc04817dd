use axum::body::Bytes;
use axum::extract::{Path, State};
use serde_json::{json, Value as JsonValue};

use crate::error::{ApiError, ErrorResponse};
use crate::expression;
use crate::models::{now_rfc3339, MutationResponse, CREATED_AT, KEY_FIELD};
use crate::response::{self, Envelope};
use crate::routes;
use crate::state::AppState;

/// PUT /items/:beaconid handler - Partially update an item
///
/// Only the fields named in the body change; everything else is left
/// untouched. The key and the creation timestamp are stripped from the
/// editable set, and `updatedAt` is refreshed unless the body supplies it.
/// Updating a key that does not exist is a 404.
#[utoipa::path(
    put,
    path = routes::ITEM,
    params(
        ("beaconid" = String, Path, description = "Key of the item")
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Item updated", body = MutationResponse),
        (status = 400, description = "Missing key, body, or fields", body = ErrorResponse),
        (status = 404, description = "Item not found", body = ErrorResponse),
        (status = 500, description = "Store error", body = ErrorResponse)
    ),
    tag = "items"
)]
pub async fn update_handler(
    State(state): State<AppState>,
    Path(beaconid): Path<String>,
    body: Bytes,
) -> Result<Envelope, ApiError> {
    if beaconid.is_empty() {
        return Err(ApiError::validation("Beacon ID is required"));
    }
    if body.is_empty() {
        return Err(ApiError::validation("Request body is required"));
    }
    let parsed: JsonValue = serde_json::from_slice(&body)
        .map_err(|_| ApiError::validation("Request body must be valid JSON"))?;
    let mut fields = parsed.as_object().cloned().unwrap_or_default();

    // The creation timestamp is not editable; the compiler strips the key.
    fields.remove(CREATED_AT);

    let now = now_rfc3339();
    let expr = expression::compile(&fields, KEY_FIELD, &now)?;

    match state
        .store
        .update(&beaconid, &expr)
        .await
        .map_err(|e| ApiError::store("Failed to update item", e))?
    {
        Some(item) => {
            tracing::info!("Updated item with beaconid: {}", beaconid);
            Ok(response::success(json!({
                "message": "Item updated successfully",
                "item": item,
            })))
        }
        None => Err(ApiError::NotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GetResponse;
    use crate::routes;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app() -> Router {
        routes::router(AppState {
            store: Arc::new(MemoryStore::new()),
        })
    }

    async fn body_json(response: axum::response::Response) -> JsonValue {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn seed(app: &Router, body: &str) -> JsonValue {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/items")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }

    fn put_item(beaconid: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(format!("/items/{}", beaconid))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn fetch(app: &Router, beaconid: &str) -> JsonValue {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/items/{}", beaconid))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        let parsed: GetResponse = serde_json::from_value(body).unwrap();
        parsed.item
    }

    #[tokio::test]
    async fn test_update_merges_only_named_fields() {
        let app = test_app();
        seed(
            &app,
            r#"{"beaconid": "beacon-7-mergelaww", "name": "Original", "lat": "40.7128", "long": "-74.0060"}"#,
        )
        .await;
        let before = fetch(&app, "beacon-7-mergelaww").await;

        let response = app
            .clone()
            .oneshot(put_item("beacon-7-mergelaww", r#"{"name": "Updated"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let parsed: MutationResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.message, "Item updated successfully");
        assert_eq!(parsed.item["name"], "Updated");

        // Fields outside the update set are byte-identical to before.
        let after = fetch(&app, "beacon-7-mergelaww").await;
        assert_eq!(after["lat"], before["lat"]);
        assert_eq!(after["long"], before["long"]);
        assert_eq!(after["description"], before["description"]);
        assert_eq!(after["createdAt"], before["createdAt"]);
        assert_eq!(after["name"], "Updated");
    }

    #[tokio::test]
    async fn test_update_cannot_change_the_key() {
        let app = test_app();
        seed(&app, r#"{"beaconid": "beacon-7-immutable", "name": "Original"}"#).await;

        let response = app
            .clone()
            .oneshot(put_item(
                "beacon-7-immutable",
                r#"{"beaconid": "beacon-9-hijacked!", "name": "Updated"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["item"]["beaconid"], "beacon-7-immutable");

        // The original key still resolves; the new one never existed.
        let kept = fetch(&app, "beacon-7-immutable").await;
        assert_eq!(kept["name"], "Updated");
        let hijacked = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/items/beacon-9-hijacked!")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(hijacked.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_refreshes_updated_at() {
        let app = test_app();
        seed(&app, r#"{"beaconid": "beacon-7-timestamp", "name": "Original"}"#).await;
        let before = fetch(&app, "beacon-7-timestamp").await;

        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        let response = app
            .clone()
            .oneshot(put_item("beacon-7-timestamp", r#"{"name": "Updated"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let after = fetch(&app, "beacon-7-timestamp").await;
        assert_ne!(after["updatedAt"], before["updatedAt"]);
        // The creation timestamp never moves.
        assert_eq!(after["createdAt"], before["createdAt"]);
    }

    #[tokio::test]
    async fn test_update_caller_supplied_updated_at_wins() {
        let app = test_app();
        seed(&app, r#"{"beaconid": "beacon-7-callerts0", "name": "Original"}"#).await;

        let response = app
            .clone()
            .oneshot(put_item(
                "beacon-7-callerts0",
                r#"{"updatedAt": "2020-01-01T00:00:00.000Z"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let after = fetch(&app, "beacon-7-callerts0").await;
        assert_eq!(after["updatedAt"], "2020-01-01T00:00:00.000Z");
    }

    #[tokio::test]
    async fn test_update_ignores_created_at_in_body() {
        let app = test_app();
        seed(&app, r#"{"beaconid": "beacon-7-createdat", "name": "Original"}"#).await;
        let before = fetch(&app, "beacon-7-createdat").await;

        let response = app
            .clone()
            .oneshot(put_item(
                "beacon-7-createdat",
                r#"{"createdAt": "1999-01-01T00:00:00.000Z", "name": "Updated"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let after = fetch(&app, "beacon-7-createdat").await;
        assert_eq!(after["createdAt"], before["createdAt"]);
    }

    #[tokio::test]
    async fn test_update_missing_body_is_400() {
        let app = test_app();
        seed(&app, r#"{"beaconid": "beacon-7-needsbody", "name": "Original"}"#).await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/items/beacon-7-needsbody")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Request body is required");
    }

    #[tokio::test]
    async fn test_update_empty_object_is_400_no_fields() {
        let app = test_app();
        seed(&app, r#"{"beaconid": "beacon-7-nofields0", "name": "Original"}"#).await;
        let before = fetch(&app, "beacon-7-nofields0").await;

        let response = app
            .clone()
            .oneshot(put_item("beacon-7-nofields0", "{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "No fields to update");

        // The rejection never issued a write; not even the timestamp moved.
        let after = fetch(&app, "beacon-7-nofields0").await;
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_update_key_and_created_at_only_is_400_no_fields() {
        let app = test_app();
        seed(&app, r#"{"beaconid": "beacon-7-nofields1", "name": "Original"}"#).await;

        let response = app
            .oneshot(put_item(
                "beacon-7-nofields1",
                r#"{"beaconid": "beacon-7-nofields1", "createdAt": "1999-01-01T00:00:00.000Z"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "No fields to update");
    }

    #[tokio::test]
    async fn test_update_nonexistent_key_is_404() {
        let app = test_app();

        let response = app
            .oneshot(put_item("nonexistent-id", r#"{"name": "Updated"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Item not found");
    }
}
