//! Like, bookmark and comment endpoints
//!
//! Curriculum scoped:
//! - POST/DELETE /api/v1/curriculums/{id}/like, GET .../likes, GET .../like/status
//! - POST/DELETE /api/v1/curriculums/{id}/bookmark, GET .../bookmark/status
//! - POST/GET /api/v1/curriculums/{id}/comments
//! - GET/PUT/DELETE /api/v1/curriculums/comments/{id}
//! - GET /api/v1/curriculums/{id}/social-stats
//!
//! Caller scoped:
//! - GET /api/v1/users/me/likes|bookmarks|comments|social-stats

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::common::{paged, AppJson, AppPath, AppQuery, PageQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::CommentResponse;
use crate::services::engagement::{BookmarkStatus, CurriculumSocialStats, LikeStatus, UserSocialStats};

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

/// Build the engagement router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/curriculums/{id}/like", post(like).delete(unlike))
        .route("/curriculums/{id}/likes", get(list_likes))
        .route("/curriculums/{id}/like/status", get(like_status))
        .route("/curriculums/{id}/bookmark", post(bookmark).delete(unbookmark))
        .route("/curriculums/{id}/bookmark/status", get(bookmark_status))
        .route(
            "/curriculums/{id}/comments",
            post(add_comment).get(list_comments),
        )
        .route(
            "/curriculums/comments/{id}",
            get(get_comment).put(update_comment).delete(delete_comment),
        )
        .route("/curriculums/{id}/social-stats", get(curriculum_stats))
        .route("/users/me/likes", get(my_likes))
        .route("/users/me/bookmarks", get(my_bookmarks))
        .route("/users/me/comments", get(my_comments))
        .route("/users/me/social-stats", get(my_stats))
}

// Likes

/// POST /api/v1/curriculums/{id}/like
async fn like(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let like = state.engagement_service.like(&user, &id).await?;
    Ok((StatusCode::CREATED, Json(like)))
}

/// DELETE /api/v1/curriculums/{id}/like
async fn unlike(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<StatusCode, ApiError> {
    state.engagement_service.unlike(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/curriculums/{id}/likes
async fn list_likes(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .engagement_service
        .list_likes(&user, &id, &query.params()?)
        .await?;
    paged("likes", result)
}

/// GET /api/v1/curriculums/{id}/like/status
async fn like_status(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<Json<LikeStatus>, ApiError> {
    Ok(Json(state.engagement_service.like_status(&user, &id).await?))
}

/// GET /api/v1/users/me/likes
async fn my_likes(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    paged("likes", state.engagement_service.my_likes(&user, &query.params()?).await?)
}

// Bookmarks

/// POST /api/v1/curriculums/{id}/bookmark
async fn bookmark(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bookmark = state.engagement_service.bookmark(&user, &id).await?;
    Ok((StatusCode::CREATED, Json(bookmark)))
}

/// DELETE /api/v1/curriculums/{id}/bookmark
async fn unbookmark(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<StatusCode, ApiError> {
    state.engagement_service.unbookmark(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/curriculums/{id}/bookmark/status
async fn bookmark_status(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<Json<BookmarkStatus>, ApiError> {
    Ok(Json(state.engagement_service.bookmark_status(&user, &id).await?))
}

/// GET /api/v1/users/me/bookmarks
async fn my_bookmarks(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    paged(
        "bookmarks",
        state.engagement_service.my_bookmarks(&user, &query.params()?).await?,
    )
}

// Comments

/// POST /api/v1/curriculums/{id}/comments
async fn add_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
    AppJson(body): AppJson<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state
        .engagement_service
        .add_comment(&user, &id, &body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(CommentResponse::from(comment))))
}

/// GET /api/v1/curriculums/{id}/comments
async fn list_comments(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .engagement_service
        .list_comments(&user, &id, &query.params()?)
        .await?;
    paged("comments", result.map(CommentResponse::from))
}

/// GET /api/v1/curriculums/comments/{id}
async fn get_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<Json<CommentResponse>, ApiError> {
    let comment = state.engagement_service.get_comment(&user, &id).await?;
    Ok(Json(comment.into()))
}

/// PUT /api/v1/curriculums/comments/{id}
async fn update_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
    AppJson(body): AppJson<CommentRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    let comment = state
        .engagement_service
        .update_comment(&user, &id, &body.content)
        .await?;
    Ok(Json(comment.into()))
}

/// DELETE /api/v1/curriculums/comments/{id}
async fn delete_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<StatusCode, ApiError> {
    state.engagement_service.delete_comment(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/users/me/comments
async fn my_comments(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .engagement_service
        .my_comments(&user, &query.params()?)
        .await?;
    paged("comments", result.map(CommentResponse::from))
}

// Stats

/// GET /api/v1/curriculums/{id}/social-stats
async fn curriculum_stats(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Result<Json<CurriculumSocialStats>, ApiError> {
    Ok(Json(state.engagement_service.curriculum_stats(&user, &id).await?))
}

/// GET /api/v1/users/me/social-stats
async fn my_stats(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<UserSocialStats>, ApiError> {
    Ok(Json(state.engagement_service.user_stats(&user).await?))
}
