//! Summary and feedback API endpoints
//!
//! - POST/GET /api/v1/curriculums/{id}/weeks/{week}/summaries
//! - GET /api/v1/curriculums/{id}/summaries
//! - GET/PUT/DELETE /api/v1/curriculums/summaries/{id}
//! - GET /api/v1/users/me/summaries
//! - POST /api/v1/summaries/{id}/feedbacks/generate
//! - GET /api/v1/summaries/{id}/feedbacks
//! - GET/DELETE /api/v1/summaries/feedbacks/{id}
//! - GET /api/v1/curriculums/{id}/feedbacks
//! - GET /api/v1/users/me/feedbacks

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::common::{default_items_per_page, default_page, paged, AppJson, AppPath, AppQuery, PageQuery, MAX_ITEMS_PER_PAGE};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{FeedbackResponse, SummaryResponse};
use crate::models::ListParams;
use crate::services::learning::MY_SUMMARIES_MAX_PER_PAGE;

#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_items_per_page")]
    pub items_per_page: u32,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
}

/// Build the learning router
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/curriculums/{id}/weeks/{week}/summaries",
            post(create_summary).get(list_week_summaries),
        )
        .route("/curriculums/{id}/summaries", get(list_curriculum_summaries))
        .route(
            "/curriculums/summaries/{id}",
            get(get_summary).put(update_summary).delete(delete_summary),
        )
        .route("/users/me/summaries", get(list_my_summaries))
        .route("/summaries/{id}/feedbacks/generate", post(generate_feedback))
        .route("/summaries/{id}/feedbacks", get(get_summary_feedback))
        .route(
            "/summaries/feedbacks/{id}",
            get(get_feedback).delete(delete_feedback),
        )
        .route("/curriculums/{id}/feedbacks", get(list_curriculum_feedbacks))
        .route("/users/me/feedbacks", get(list_my_feedbacks))
}

/// POST /api/v1/curriculums/{id}/weeks/{week}/summaries
async fn create_summary(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath((id, week)): AppPath<(String, i64)>,
    AppJson(body): AppJson<SummaryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .learning_service
        .create_summary(&user, &id, week, &body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(SummaryResponse::from(summary))))
}

/// GET /api/v1/curriculums/{id}/weeks/{week}/summaries
async fn list_week_summaries(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath((id, week)): AppPath<(String, i64)>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .learning_service
        .list_week_summaries(&user, &id, week, &query.params()?)
        .await?;
    paged("summaries", result.map(SummaryResponse::list_item))
}

/// GET /api/v1/curriculums/{id}/summaries
async fn list_curriculum_summaries(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .learning_service
        .list_curriculum_summaries(&user, &id, &query.params()?)
        .await?;
    paged("summaries", result.map(SummaryResponse::list_item))
}

/// GET /api/v1/curriculums/summaries/{id}
async fn get_summary(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let summary = state.learning_service.get_summary(&user, &id).await?;
    Ok(Json(summary.into()))
}

/// PUT /api/v1/curriculums/summaries/{id}
async fn update_summary(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
    AppJson(body): AppJson<SummaryRequest>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let summary = state
        .learning_service
        .update_summary(&user, &id, &body.content)
        .await?;
    Ok(Json(summary.into()))
}

/// DELETE /api/v1/curriculums/summaries/{id}
async fn delete_summary(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<StatusCode, ApiError> {
    state.learning_service.delete_summary(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/users/me/summaries
async fn list_my_summaries(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let params = query.params_up_to(MY_SUMMARIES_MAX_PER_PAGE)?;
    let result = state.learning_service.list_my_summaries(&user, &params).await?;
    paged("summaries", result.map(SummaryResponse::list_item))
}

/// POST /api/v1/summaries/{id}/feedbacks/generate
async fn generate_feedback(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let feedback = state.learning_service.generate_feedback(&user, &id).await?;
    Ok((StatusCode::CREATED, Json(FeedbackResponse::from(feedback))))
}

/// GET /api/v1/summaries/{id}/feedbacks
async fn get_summary_feedback(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let feedback = state.learning_service.get_summary_feedback(&user, &id).await?;
    Ok(Json(feedback.into()))
}

/// GET /api/v1/summaries/feedbacks/{id}
async fn get_feedback(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let feedback = state.learning_service.get_feedback(&user, &id).await?;
    Ok(Json(feedback.into()))
}

/// DELETE /api/v1/summaries/feedbacks/{id}
async fn delete_feedback(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<StatusCode, ApiError> {
    state.learning_service.delete_feedback(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/curriculums/{id}/feedbacks
async fn list_curriculum_feedbacks(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .learning_service
        .list_curriculum_feedbacks(&user, &id, &query.params()?)
        .await?;
    paged("feedbacks", result.map(FeedbackResponse::from))
}

/// GET /api/v1/users/me/feedbacks
async fn list_my_feedbacks(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppQuery(query): AppQuery<FeedbackQuery>,
) -> Result<Json<Value>, ApiError> {
    let params = ListParams::checked(query.page, query.items_per_page, MAX_ITEMS_PER_PAGE)?;
    let result = state
        .learning_service
        .list_my_feedbacks(&user, query.min_score, query.max_score, &params)
        .await?;
    paged("feedbacks", result.map(FeedbackResponse::from))
}
