use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{config::LoggingMode, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
    pub logging: LoggingStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoggingStatus {
    pub mode: LoggingMode,
    pub ignore_routes: usize,
}

/// Basic health check endpoint
///
/// Reports the configured logging mode alongside the usual liveness data.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    debug!("Health check requested");

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        logging: LoggingStatus {
            mode: state.config.logging.mode,
            ignore_routes: state.config.logging.ignore_routes.len(),
        },
    })
}
