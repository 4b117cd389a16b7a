//! Follow graph endpoints
//!
//! - POST /api/v1/social/follow, DELETE /api/v1/social/unfollow
//! - GET /api/v1/social/users/{id}/followers|following|stats|status
//! - GET /api/v1/social/me/followers|following
//! - GET /api/v1/social/suggestions

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::common::{paged, AppJson, AppPath, AppQuery, PageQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::social::{FollowStats, FollowStatus, DEFAULT_SUGGESTIONS};

#[derive(Debug, Deserialize)]
pub struct FollowRequest {
    pub followee_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionQuery {
    #[serde(default = "default_suggestions")]
    pub limit: i64,
}

fn default_suggestions() -> i64 {
    DEFAULT_SUGGESTIONS
}

/// Build the social router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/social/follow", post(follow))
        .route("/social/unfollow", delete(unfollow))
        .route("/social/users/{id}/followers", get(followers))
        .route("/social/users/{id}/following", get(following))
        .route("/social/users/{id}/stats", get(stats))
        .route("/social/users/{id}/status", get(status))
        .route("/social/me/followers", get(my_followers))
        .route("/social/me/following", get(my_following))
        .route("/social/suggestions", get(suggestions))
}

/// POST /api/v1/social/follow
async fn follow(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppJson(body): AppJson<FollowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let follow = state.social_service.follow(&user, &body.followee_id).await?;
    Ok((StatusCode::CREATED, Json(follow)))
}

/// DELETE /api/v1/social/unfollow
async fn unfollow(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppJson(body): AppJson<FollowRequest>,
) -> Result<StatusCode, ApiError> {
    state.social_service.unfollow(&user, &body.followee_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/social/users/{id}/followers
async fn followers(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let result = state.social_service.followers(&user, &id, &query.params()?).await?;
    paged("followers", result)
}

/// GET /api/v1/social/users/{id}/following
async fn following(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let result = state.social_service.following(&user, &id, &query.params()?).await?;
    paged("followees", result)
}

/// GET /api/v1/social/users/{id}/stats
async fn stats(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<Json<FollowStats>, ApiError> {
    Ok(Json(state.social_service.stats(&id).await?))
}

/// GET /api/v1/social/users/{id}/status
async fn status(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<Json<FollowStatus>, ApiError> {
    Ok(Json(state.social_service.status(&user, &id).await?))
}

/// GET /api/v1/social/me/followers
async fn my_followers(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .social_service
        .followers(&user, &user.id, &query.params()?)
        .await?;
    paged("followers", result)
}

/// GET /api/v1/social/me/following
async fn my_following(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .social_service
        .following(&user, &user.id, &query.params()?)
        .await?;
    paged("followees", result)
}

/// GET /api/v1/social/suggestions
async fn suggestions(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppQuery(query): AppQuery<SuggestionQuery>,
) -> Result<Json<Value>, ApiError> {
    let suggestions = state.social_service.suggestions(&user, query.limit).await?;
    Ok(Json(json!({ "suggestions": suggestions })))
}
