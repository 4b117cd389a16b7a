//! Learning statistics endpoints
//!
//! - GET /api/v1/users/me/learning/stats?days - Full report
//! - GET /api/v1/users/me/learning/overview - Last week at a glance
//! - GET /api/v1/users/me/learning/progress - Per curriculum and per month
//! - GET /api/v1/users/me/learning/streak - Streak only

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::common::AppQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::stats::{LearningStats, DEFAULT_STATS_DAYS, MAX_STATS_DAYS};

const OVERVIEW_DAYS: i64 = 7;
const PROGRESS_DAYS: i64 = 90;

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    DEFAULT_STATS_DAYS
}

/// Build the statistics router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/me/learning/stats", get(learning_stats))
        .route("/users/me/learning/overview", get(overview))
        .route("/users/me/learning/progress", get(progress))
        .route("/users/me/learning/streak", get(streak))
}

/// GET /api/v1/users/me/learning/stats
async fn learning_stats(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppQuery(query): AppQuery<StatsQuery>,
) -> Result<Json<LearningStats>, ApiError> {
    Ok(Json(state.stats_service.learning_stats(&user, query.days).await?))
}

/// GET /api/v1/users/me/learning/overview
async fn overview(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    let stats = state.stats_service.learning_stats(&user, OVERVIEW_DAYS).await?;
    Ok(Json(json!({
        "user_id": stats.user_id,
        "period_days": stats.period_days,
        "total_summaries": stats.total_summaries,
        "total_feedbacks": stats.total_feedbacks,
        "average_score": stats.average_score,
        "streak": stats.streak,
        "recent_activities": stats.recent_activities,
        "weekly_goal_achievement": stats.weekly_goal_achievement,
    })))
}

/// GET /api/v1/users/me/learning/progress
async fn progress(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    let stats = state.stats_service.learning_stats(&user, PROGRESS_DAYS).await?;
    Ok(Json(json!({
        "user_id": stats.user_id,
        "period_days": stats.period_days,
        "curriculum_progress": stats.curriculum_progress,
        "monthly_progress": stats.monthly_progress,
        "score_distribution": stats.score_distribution,
    })))
}

/// GET /api/v1/users/me/learning/streak
async fn streak(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    let stats = state.stats_service.learning_stats(&user, MAX_STATS_DAYS).await?;
    Ok(Json(json!({
        "user_id": stats.user_id,
        "streak": stats.streak,
        "weekly_goal_achievement": stats.weekly_goal_achievement,
    })))
}
