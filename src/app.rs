use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer};

use crate::{middleware::TrafficLogging, routes, AppState};

/// Builds the demo router. Traffic logging wraps the timeout, so timed-out
/// requests are logged with their 408, and sits inside compression, so it
/// sees uncompressed bodies.
pub fn create_app(state: AppState, traffic: &TrafficLogging) -> Router {
    let timeout_seconds = state.config.server.timeout_seconds;

    let router = Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/v1/echo", post(routes::demo::echo))
        .route("/api/v1/accounts/:id/holder", get(routes::demo::account_holder))
        .route("/api/v1/stream", get(routes::demo::stream))
        .route("/api/v1/delay", get(routes::demo::delay))
        .layer(TimeoutLayer::new(Duration::from_secs(timeout_seconds)));

    traffic
        .apply(router)
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}
