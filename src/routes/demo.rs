use axum::{
    body::Body,
    extract::{Path, Query},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct AccountHolder {
    pub account_id: String,
    pub holder: String,
    pub retrieved_at: String,
}

/// Returns the JSON payload it was given.
pub async fn echo(Json(payload): Json<Value>) -> Result<Json<Value>, StatusCode> {
    if payload.is_null() {
        warn!("Rejecting empty echo payload");
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    Ok(Json(json!({ "echo": payload })))
}

pub async fn account_holder(Path(account_id): Path<String>) -> Json<AccountHolder> {
    info!(account_id = %account_id, "Account holder requested");

    Json(AccountHolder {
        holder: format!("holder-{account_id}"),
        account_id,
        retrieved_at: chrono::Utc::now().to_rfc3339(),
    })
}

/// Longest pause `/api/v1/delay` will honour.
pub const MAX_DELAY_MS: u64 = 10_000;

#[derive(Debug, Deserialize)]
pub struct DelayParams {
    #[serde(default)]
    pub ms: u64,
}

/// Waits `ms` milliseconds (capped at [`MAX_DELAY_MS`]) before answering.
pub async fn delay(Query(params): Query<DelayParams>) -> Json<Value> {
    let waited = params.ms.min(MAX_DELAY_MS);
    tokio::time::sleep(Duration::from_millis(waited)).await;

    Json(json!({ "waited_ms": waited }))
}

/// Sends its payload as two separate JSON chunks.
pub async fn stream() -> Body {
    let chunks = vec![json!({ "a": 1 }), json!({ "a": 2 })]
        .into_iter()
        .map(|chunk| serde_json::to_vec(&chunk));

    Body::from_stream(futures::stream::iter(chunks))
}
