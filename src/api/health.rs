//! Health check

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::api::middleware::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// GET /api/v1/health
async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = match state.pool.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Health check database ping failed");
            "error"
        }
    };
    Json(json!({ "status": "ok", "database": database }))
}
