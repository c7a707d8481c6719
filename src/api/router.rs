use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, get_events_since, get_stream, get_stream_events, get_unpublished_events,
};

/// Creates the API router with the event store read endpoints
///
/// - GET /streams/:name - Stream version and snapshot version
/// - GET /streams/:name/events?from=N - Events of one stream, version-ordered
/// - GET /events?since=N - Events of every stream, clock-ordered
/// - GET /events/unpublished - Events not yet handed to the message bus
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .route("/streams/:name", get(get_stream))
        .route("/streams/:name/events", get(get_stream_events))
        .route("/events", get(get_events_since))
        .route("/events/unpublished", get(get_unpublished_events))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
