use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::api::handlers::{translate, warmup, AppState};
use crate::api::middleware::{method_not_allowed, not_found};

/// Create router with application state
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route(
            "/translate",
            get(translate::translate).fallback(method_not_allowed),
        )
        .route(
            "/warmup",
            get(warmup::warmup).fallback(method_not_allowed),
        )
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
