//! HTTP router construction.
//!
//! Assembles all Axum routes and middleware into a single `Router`.

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api;
use crate::state::AppState;

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/alarms", post(api::create_alarm).get(api::list_alarms))
        .route(
            "/alarms/{code_id}",
            get(api::get_alarm).delete(api::delete_alarm),
        )
        .route("/health", get(api::health))
        .route("/stats", get(api::stats))
        .route("/reload", post(api::reload))
        .route("/codes/{code_id}", put(api::put_code_description))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
