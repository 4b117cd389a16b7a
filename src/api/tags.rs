//! Tag API endpoints
//!
//! Handles HTTP requests for tags and curriculum tagging:
//! - POST/GET /api/v1/tags - Find-or-create, paged list
//! - GET /api/v1/tags/popular, /api/v1/tags/search, /api/v1/tags/statistics
//! - GET/PATCH/DELETE /api/v1/tags/{id}
//! - POST/DELETE /api/v1/curriculums/{id}/tags
//! - GET /api/v1/curriculums/{id}/tags-and-category
//! - GET /api/v1/curriculums/search/by-tags?tags=a,b

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::common::{default_items_per_page, default_page, paged, AppJson, AppPath, AppQuery, PageQuery, MAX_ITEMS_PER_PAGE};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{ListParams, Tag};
use crate::services::taxonomy::{
    CurriculumTaxonomy, TagStatistics, DEFAULT_POPULAR_LIMIT, DEFAULT_SEARCH_LIMIT,
};

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ListTagsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_items_per_page")]
    pub items_per_page: u32,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PopularQuery {
    #[serde(default = "default_popular_limit")]
    pub limit: i64,
    #[serde(default = "default_min_usage")]
    pub min_usage: i64,
}

fn default_popular_limit() -> i64 {
    DEFAULT_POPULAR_LIMIT
}

fn default_min_usage() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
}

fn default_search_limit() -> i64 {
    DEFAULT_SEARCH_LIMIT
}

#[derive(Debug, Deserialize)]
pub struct AddTagsRequest {
    pub tag_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveTagQuery {
    pub tag_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ByTagsQuery {
    pub tags: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_items_per_page")]
    pub items_per_page: u32,
}

/// Build the tags router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tags", post(create_tag).get(list_tags))
        .route("/tags/popular", get(popular_tags))
        .route("/tags/search", get(search_tags))
        .route("/tags/statistics", get(tag_statistics))
        .route("/tags/{id}", get(get_tag).patch(update_tag).delete(delete_tag))
        .route(
            "/curriculums/{id}/tags",
            post(add_curriculum_tags).delete(remove_curriculum_tag),
        )
        .route("/curriculums/{id}/tags-and-category", get(curriculum_taxonomy))
        .route("/curriculums/search/by-tags", get(search_by_tags))
}

/// POST /api/v1/tags
async fn create_tag(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppJson(body): AppJson<TagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tag = state.taxonomy_service.create_tag(&user, &body.name).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// GET /api/v1/tags
async fn list_tags(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppQuery(query): AppQuery<ListTagsQuery>,
) -> Result<Json<Value>, ApiError> {
    let params = ListParams::checked(query.page, query.items_per_page, MAX_ITEMS_PER_PAGE)?;
    let result = state
        .taxonomy_service
        .list_tags(query.search.as_deref(), &params)
        .await?;
    paged("tags", result)
}

/// GET /api/v1/tags/popular
async fn popular_tags(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppQuery(query): AppQuery<PopularQuery>,
) -> Result<Json<Vec<Tag>>, ApiError> {
    Ok(Json(
        state
            .taxonomy_service
            .popular_tags(query.limit, query.min_usage)
            .await?,
    ))
}

/// GET /api/v1/tags/search
async fn search_tags(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppQuery(query): AppQuery<SearchQuery>,
) -> Result<Json<Value>, ApiError> {
    let suggestions = state.taxonomy_service.search_tags(&query.q, query.limit).await?;
    Ok(Json(json!({ "suggestions": suggestions })))
}

/// GET /api/v1/tags/statistics
async fn tag_statistics(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<TagStatistics>, ApiError> {
    Ok(Json(state.taxonomy_service.tag_statistics().await?))
}

/// GET /api/v1/tags/{id}
async fn get_tag(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<Json<Tag>, ApiError> {
    Ok(Json(state.taxonomy_service.get_tag(&id).await?))
}

/// PATCH /api/v1/tags/{id}
async fn update_tag(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
    AppJson(body): AppJson<TagRequest>,
) -> Result<Json<Tag>, ApiError> {
    Ok(Json(
        state
            .taxonomy_service
            .update_tag(&user, &id, &body.name)
            .await?,
    ))
}

/// DELETE /api/v1/tags/{id}
async fn delete_tag(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<StatusCode, ApiError> {
    state.taxonomy_service.delete_tag(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/curriculums/{id}/tags
async fn add_curriculum_tags(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
    AppJson(body): AppJson<AddTagsRequest>,
) -> Result<Json<Value>, ApiError> {
    let tags = state
        .taxonomy_service
        .add_tags(&user, &id, &body.tag_names)
        .await?;
    Ok(Json(json!({ "curriculum_id": id, "tags": tags })))
}

/// DELETE /api/v1/curriculums/{id}/tags?tag_name=
async fn remove_curriculum_tag(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
    AppQuery(query): AppQuery<RemoveTagQuery>,
) -> Result<StatusCode, ApiError> {
    state
        .taxonomy_service
        .remove_tag(&user, &id, &query.tag_name)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/curriculums/{id}/tags-and-category
async fn curriculum_taxonomy(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<Json<CurriculumTaxonomy>, ApiError> {
    Ok(Json(state.taxonomy_service.curriculum_taxonomy(&user, &id).await?))
}

/// GET /api/v1/curriculums/search/by-tags
async fn search_by_tags(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppQuery(query): AppQuery<ByTagsQuery>,
) -> Result<Json<Value>, ApiError> {
    let params = PageQuery {
        page: query.page,
        items_per_page: query.items_per_page,
    }
    .params()?;
    let result = state
        .taxonomy_service
        .search_by_tags(&user, &query.tags, &params)
        .await?;
    paged("curriculums", result)
}
