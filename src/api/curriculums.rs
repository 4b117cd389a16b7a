//! Curriculum API endpoints
//!
//! Curricula, their weeks and the lessons inside each week:
//! - POST /api/v1/curriculums, POST /api/v1/curriculums/generate
//! - GET /api/v1/curriculums/me|public|following
//! - GET/PATCH/DELETE /api/v1/curriculums/{id}
//! - POST /api/v1/curriculums/{id}/weeks, DELETE .../weeks/{week}
//! - POST .../weeks/{week}/lessons, PUT/DELETE .../lessons/{index}

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::common::{paged, AppJson, AppPath, AppQuery, PageQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Curriculum, CurriculumSummary, PagedResult};
use crate::services::curriculum::{
    CreateCurriculumInput, GenerateCurriculumInput, UpdateCurriculumInput, WeekInput,
};

#[derive(Debug, Deserialize)]
pub struct AddLessonRequest {
    pub lesson: String,
    #[serde(default)]
    pub lesson_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLessonRequest {
    pub lesson: String,
}

/// Build the curriculums router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/curriculums", post(create_curriculum))
        .route("/curriculums/generate", post(generate_curriculum))
        .route("/curriculums/me", get(list_mine))
        .route("/curriculums/public", get(list_public))
        .route("/curriculums/following", get(list_following))
        .route(
            "/curriculums/{id}",
            get(get_curriculum).patch(update_curriculum).delete(delete_curriculum),
        )
        .route("/curriculums/{id}/weeks", post(insert_week))
        .route("/curriculums/{id}/weeks/{week}", delete(remove_week))
        .route("/curriculums/{id}/weeks/{week}/lessons", post(add_lesson))
        .route(
            "/curriculums/{id}/weeks/{week}/lessons/{index}",
            put(update_lesson).delete(delete_lesson),
        )
}

fn briefs(page: PagedResult<Curriculum>) -> Result<Json<Value>, ApiError> {
    paged("curriculums", page.map(|c| CurriculumSummary::from(&c)))
}

/// POST /api/v1/curriculums
async fn create_curriculum(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppJson(body): AppJson<CreateCurriculumInput>,
) -> Result<impl IntoResponse, ApiError> {
    let curriculum = state.curriculum_service.create(&user, body).await?;
    Ok((StatusCode::CREATED, Json(curriculum)))
}

/// POST /api/v1/curriculums/generate
async fn generate_curriculum(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppJson(body): AppJson<GenerateCurriculumInput>,
) -> Result<impl IntoResponse, ApiError> {
    let curriculum = state.curriculum_service.generate(&user, body).await?;
    Ok((StatusCode::CREATED, Json(curriculum)))
}

/// GET /api/v1/curriculums/me
async fn list_mine(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    briefs(state.curriculum_service.list_mine(&user, &query.params()?).await?)
}

/// GET /api/v1/curriculums/public
async fn list_public(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    briefs(state.curriculum_service.list_public(&query.params()?).await?)
}

/// GET /api/v1/curriculums/following
async fn list_following(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    briefs(state.curriculum_service.list_following(&user, &query.params()?).await?)
}

/// GET /api/v1/curriculums/{id}
async fn get_curriculum(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<Json<Curriculum>, ApiError> {
    Ok(Json(state.curriculum_service.get(&user, &id).await?))
}

/// PATCH /api/v1/curriculums/{id}
async fn update_curriculum(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
    AppJson(body): AppJson<UpdateCurriculumInput>,
) -> Result<Json<Curriculum>, ApiError> {
    Ok(Json(state.curriculum_service.update(&user, &id, body).await?))
}

/// DELETE /api/v1/curriculums/{id}
async fn delete_curriculum(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<StatusCode, ApiError> {
    state.curriculum_service.delete(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/curriculums/{id}/weeks
async fn insert_week(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
    AppJson(body): AppJson<WeekInput>,
) -> Result<impl IntoResponse, ApiError> {
    let curriculum = state.curriculum_service.insert_week(&user, &id, body).await?;
    Ok((StatusCode::CREATED, Json(curriculum)))
}

/// DELETE /api/v1/curriculums/{id}/weeks/{week}
async fn remove_week(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath((id, week)): AppPath<(String, i64)>,
) -> Result<Json<Curriculum>, ApiError> {
    Ok(Json(state.curriculum_service.remove_week(&user, &id, week).await?))
}

/// POST /api/v1/curriculums/{id}/weeks/{week}/lessons
async fn add_lesson(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath((id, week)): AppPath<(String, i64)>,
    AppJson(body): AppJson<AddLessonRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let curriculum = state
        .curriculum_service
        .add_lesson(&user, &id, week, &body.lesson, body.lesson_index)
        .await?;
    Ok((StatusCode::CREATED, Json(curriculum)))
}

/// PUT /api/v1/curriculums/{id}/weeks/{week}/lessons/{index}
async fn update_lesson(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath((id, week, index)): AppPath<(String, i64, usize)>,
    AppJson(body): AppJson<UpdateLessonRequest>,
) -> Result<Json<Curriculum>, ApiError> {
    Ok(Json(
        state
            .curriculum_service
            .update_lesson(&user, &id, week, index, &body.lesson)
            .await?,
    ))
}

/// DELETE /api/v1/curriculums/{id}/weeks/{week}/lessons/{index}
async fn delete_lesson(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath((id, week, index)): AppPath<(String, i64, usize)>,
) -> Result<Json<Curriculum>, ApiError> {
    Ok(Json(
        state
            .curriculum_service
            .delete_lesson(&user, &id, week, index)
            .await?,
    ))
}
