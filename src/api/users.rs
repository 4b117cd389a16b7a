//! User API endpoints
//!
//! - GET/PUT/DELETE /api/v1/users/me - Own profile
//! - GET /api/v1/users - User directory
//! - GET /api/v1/users/{name} - Profile by display name

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::common::{default_page, paged, AppJson, AppPath, AppQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{ListParams, User};
use crate::services::user::{UpdateUserInput, USERS_PER_PAGE};

#[derive(Debug, Deserialize)]
pub struct DirectoryQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_directory_page_size")]
    pub items_per_page: u32,
}

fn default_directory_page_size() -> u32 {
    USERS_PER_PAGE
}

/// Build the users router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/me", get(get_me).put(update_me).delete(delete_me))
        .route("/users/{name}", get(get_by_name))
}

/// GET /api/v1/users/me
async fn get_me(AuthenticatedUser(user): AuthenticatedUser) -> Json<User> {
    Json(user)
}

/// PUT /api/v1/users/me
async fn update_me(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppJson(body): AppJson<UpdateUserInput>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.update(&user.id, body).await?))
}

/// DELETE /api/v1/users/me
async fn delete_me(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<StatusCode, ApiError> {
    state.user_service.delete(&user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/users
async fn list_users(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppQuery(query): AppQuery<DirectoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let params = ListParams::checked(query.page, query.items_per_page, 100)?;
    paged("users", state.user_service.list(&params).await?)
}

/// GET /api/v1/users/{name}
async fn get_by_name(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppPath(name): AppPath<String>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.get_by_name(&name).await?))
}
