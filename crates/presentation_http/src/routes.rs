//! Route definitions

use axum::{
    Router,
    routing::{get, post},
};

use crate::{handlers, state::AppState};

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Query API (v1)
        .route("/v1/query", post(handlers::query::execute_query))
        .route("/v1/recommendations", get(handlers::query::recommend))
        // System API
        .route("/v1/system/status", get(handlers::system::status))
        .route("/v1/system/health", get(handlers::system::health))
        // Attach state
        .with_state(state)
}
