//! Scrollback server library: configuration, logging, application state and
//! the HTTP API. Separated from main.rs so the router can be exercised in
//! integration tests.

pub mod config;
pub mod logging;
pub mod output;
pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// Build the full application router: `/api` plus static files.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/stats", get(routes::stats))
        // Sessions and their interaction timeline
        .route("/sessions", get(routes::sessions::list))
        .route("/sessions/{id}", get(routes::sessions::get))
        .route(
            "/sessions/{id}/interactions",
            get(routes::sessions::list_interactions),
        )
        .route(
            "/sessions/{id}/interactions/{interaction_id}",
            get(routes::sessions::get_interaction),
        )
        // Search
        .route("/search", get(routes::search::search))
        .route(
            "/search/interactions",
            get(routes::search::search_interactions),
        )
        .route("/search/commits", get(routes::search::search_commits))
        // Messages and commits
        .route("/messages/{id}", get(routes::messages::get))
        .route("/messages/{id}/context", get(routes::messages::context))
        .route("/commits/{hash}", get(routes::commits::get))
        .route("/health", get(routes::health));

    let static_dir = state.config.static_dir.clone();

    Router::new()
        .nest("/api", api_routes)
        .fallback_service(ServeDir::new(static_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
