// Route path constants - single source of truth for all API paths

use axum::routing::get;
use axum::Router;

use crate::handlers::{
    create_handler, delete_handler, get_handler, health_handler, list_handler, update_handler,
};
use crate::state::AppState;

pub const HEALTH: &str = "/health";
pub const ITEMS: &str = "/items";
pub const ITEM: &str = "/items/{beaconid}";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(HEALTH, get(health_handler))
        .route(ITEMS, get(list_handler).post(create_handler))
        .route(
            ITEM,
            get(get_handler).put(update_handler).delete(delete_handler),
        )
        .with_state(state)
}
