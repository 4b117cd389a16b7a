//! Category API endpoints
//!
//! Reads are open to any signed-in user; mutations need an admin.
//! - POST/GET /api/v1/categories, GET /api/v1/categories/active|statistics
//! - POST /api/v1/categories/reorder
//! - GET/PATCH/DELETE /api/v1/categories/{id}
//! - POST /api/v1/categories/{id}/activate|deactivate
//! - POST/DELETE /api/v1/curriculums/{id}/category
//! - GET /api/v1/curriculums/search/by-category/{id}

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::common::{paged, AppJson, AppPath, AppQuery, PageQuery};
use crate::api::middleware::{AdminUser, ApiError, AppState, AuthenticatedUser};
use crate::db::repositories::CategoryWithUsage;
use crate::models::Category;
use crate::services::taxonomy::{CategoryStatistics, CreateCategoryInput, UpdateCategoryInput};

#[derive(Debug, Deserialize)]
pub struct ListCategoriesQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReorderItem {
    pub category_id: String,
    pub sort_order: i64,
}

#[derive(Debug, Deserialize)]
pub struct AssignCategoryRequest {
    pub category_id: String,
}

/// Build the categories router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", post(create_category).get(list_categories))
        .route("/categories/active", get(list_active))
        .route("/categories/statistics", get(category_statistics))
        .route("/categories/reorder", post(reorder_categories))
        .route(
            "/categories/{id}",
            get(get_category).patch(update_category).delete(delete_category),
        )
        .route("/categories/{id}/activate", post(activate))
        .route("/categories/{id}/deactivate", post(deactivate))
        .route(
            "/curriculums/{id}/category",
            post(assign_category).delete(unassign_category),
        )
        .route("/curriculums/search/by-category/{id}", get(search_by_category))
}

/// POST /api/v1/categories
async fn create_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppJson(body): AppJson<CreateCategoryInput>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state.taxonomy_service.create_category(body).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /api/v1/categories
async fn list_categories(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppQuery(query): AppQuery<ListCategoriesQuery>,
) -> Result<Json<Value>, ApiError> {
    let categories = state
        .taxonomy_service
        .list_categories(query.include_inactive)
        .await?;
    Ok(Json(json!({ "categories": categories })))
}

/// GET /api/v1/categories/active
async fn list_active(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<CategoryWithUsage>>, ApiError> {
    Ok(Json(state.taxonomy_service.list_categories(false).await?))
}

/// GET /api/v1/categories/statistics
async fn category_statistics(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<CategoryStatistics>, ApiError> {
    Ok(Json(state.taxonomy_service.category_statistics().await?))
}

/// POST /api/v1/categories/reorder
async fn reorder_categories(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppJson(body): AppJson<Vec<ReorderItem>>,
) -> Result<StatusCode, ApiError> {
    let orders = body
        .into_iter()
        .map(|item| (item.category_id, item.sort_order))
        .collect();
    state.taxonomy_service.reorder_categories(orders).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/categories/{id}
async fn get_category(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<Json<CategoryWithUsage>, ApiError> {
    Ok(Json(state.taxonomy_service.get_category(&id).await?))
}

/// PATCH /api/v1/categories/{id}
async fn update_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<String>,
    AppJson(body): AppJson<UpdateCategoryInput>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.taxonomy_service.update_category(&id, body).await?))
}

/// DELETE /api/v1/categories/{id}
async fn delete_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<String>,
) -> Result<StatusCode, ApiError> {
    state.taxonomy_service.delete_category(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/categories/{id}/activate
async fn activate(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<String>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.taxonomy_service.set_category_active(&id, true).await?))
}

/// POST /api/v1/categories/{id}/deactivate
async fn deactivate(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<String>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.taxonomy_service.set_category_active(&id, false).await?))
}

/// POST /api/v1/curriculums/{id}/category
async fn assign_category(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
    AppJson(body): AppJson<AssignCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(
        state
            .taxonomy_service
            .assign_category(&user, &id, &body.category_id)
            .await?,
    ))
}

/// DELETE /api/v1/curriculums/{id}/category
async fn unassign_category(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<StatusCode, ApiError> {
    state.taxonomy_service.unassign_category(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/curriculums/search/by-category/{id}
async fn search_by_category(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .taxonomy_service
        .search_by_category(&user, &id, &query.params()?)
        .await?;
    paged("curriculums", result)
}
