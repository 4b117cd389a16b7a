//! Admin API endpoints
//!
//! Every route here sits behind `require_admin`.
//! - GET /api/v1/admin/users, GET /api/v1/admin/users/{id}
//! - PATCH /api/v1/admin/users/{id}/role
//! - GET /api/v1/admin/curriculums?owner_id
//! - GET/DELETE /api/v1/admin/curriculums/{id}
//! - PATCH /api/v1/admin/curriculums/{id}/visibility

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::common::{default_items_per_page, default_page, paged, AppJson, AppPath, AppQuery, PageQuery, MAX_ITEMS_PER_PAGE};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Curriculum, CurriculumSummary, ListParams, User, UserRole};

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub visibility: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminCurriculumQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_items_per_page")]
    pub items_per_page: u32,
    pub owner_id: Option<String>,
}

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}", get(get_user))
        .route("/admin/users/{id}/role", patch(set_role))
        .route("/admin/curriculums", get(list_curricula))
        .route(
            "/admin/curriculums/{id}",
            get(get_curriculum).delete(delete_curriculum),
        )
        .route("/admin/curriculums/{id}/visibility", patch(set_visibility))
}

/// GET /api/v1/admin/users
async fn list_users(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    paged("users", state.user_service.list(&query.params()?).await?)
}

/// GET /api/v1/admin/users/{id}
async fn get_user(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.get_by_id(&id).await?))
}

/// PATCH /api/v1/admin/users/{id}/role
async fn set_role(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    AppPath(id): AppPath<String>,
    AppJson(body): AppJson<RoleRequest>,
) -> Result<Json<User>, ApiError> {
    let role: UserRole = body.role.parse()?;
    let user = state.user_service.set_role(&id, role).await?;
    tracing::info!(admin_id = %admin.id, user_id = %id, role = %role, "User role changed");
    Ok(Json(user))
}

/// GET /api/v1/admin/curriculums
async fn list_curricula(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<AdminCurriculumQuery>,
) -> Result<Json<Value>, ApiError> {
    let params = ListParams::checked(query.page, query.items_per_page, MAX_ITEMS_PER_PAGE)?;
    let owner_id = query.owner_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let result = state.admin_service.list_curricula(owner_id, &params).await?;
    paged("curriculums", result.map(|c| CurriculumSummary::from(&c)))
}

/// GET /api/v1/admin/curriculums/{id}
async fn get_curriculum(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> Result<Json<Curriculum>, ApiError> {
    Ok(Json(state.admin_service.get_curriculum(&id).await?))
}

/// PATCH /api/v1/admin/curriculums/{id}/visibility
async fn set_visibility(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
    AppJson(body): AppJson<VisibilityRequest>,
) -> Result<Json<Curriculum>, ApiError> {
    Ok(Json(
        state
            .admin_service
            .set_visibility(&id, &body.visibility)
            .await?,
    ))
}

/// DELETE /api/v1/admin/curriculums/{id}
async fn delete_curriculum(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> Result<StatusCode, ApiError> {
    state.admin_service.delete_curriculum(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
