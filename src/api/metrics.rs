//! Prometheus scrape endpoint
//!
//! - GET /metrics - Counters, totals and request metrics in the text format

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::metrics;

pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(export))
}

/// GET /metrics
async fn export(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    if let Err(e) = metrics::collect_gauges(&state.pool).await {
        tracing::warn!(error = %e, "Failed to refresh metric totals");
    }
    let body = metrics::render().map_err(|e| ApiError::internal_error(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
