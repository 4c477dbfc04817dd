use std::sync::Arc;

use crate::store::ItemStore;

/// Shared application state.
///
/// The store handle is injected here at wiring time rather than reached for
/// globally, so handlers run unchanged against the in-memory store in tests.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ItemStore>,
}
