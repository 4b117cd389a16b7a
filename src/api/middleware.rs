//! API middleware
//!
//! Contains:
//! - Application state shared by every handler
//! - The JSON error envelope returned on failure
//! - Authentication (bearer JWT) and admin authorization

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::MemoryCache;
use crate::db::repositories::{
    SqlxBookmarkRepository, SqlxCategoryRepository, SqlxCommentRepository,
    SqlxCurriculumRepository, SqlxFeedRepository, SqlxFeedbackRepository, SqlxFollowRepository,
    SqlxLikeRepository, SqlxSummaryRepository, SqlxTagRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    AdminService, CurriculumService, EngagementService, FeedService, LearningService, LlmClient,
    LoginRateLimiter, SocialService, StatsService, TaxonomyService, TokenService, UserService,
    UserServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub curriculum_service: Arc<CurriculumService>,
    pub learning_service: Arc<LearningService>,
    pub stats_service: Arc<StatsService>,
    pub social_service: Arc<SocialService>,
    pub engagement_service: Arc<EngagementService>,
    pub taxonomy_service: Arc<TaxonomyService>,
    pub feed_service: Arc<FeedService>,
    pub admin_service: Arc<AdminService>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    /// Read client addresses from `X-Forwarded-For` / `X-Real-IP`
    pub trust_proxy_headers: bool,
}

impl AppState {
    /// Wire every repository and service onto one pool and cache
    pub fn new(
        pool: DynDatabasePool,
        cache: Arc<MemoryCache>,
        llm: Arc<dyn LlmClient>,
        tokens: TokenService,
    ) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let curriculum_repo = SqlxCurriculumRepository::boxed(pool.clone());
        let summary_repo = SqlxSummaryRepository::boxed(pool.clone());
        let feedback_repo = SqlxFeedbackRepository::boxed(pool.clone());

        Self {
            user_service: Arc::new(UserService::new(user_repo.clone(), tokens, cache.clone())),
            curriculum_service: Arc::new(CurriculumService::new(
                curriculum_repo.clone(),
                llm.clone(),
                cache.clone(),
            )),
            learning_service: Arc::new(LearningService::new(
                summary_repo.clone(),
                feedback_repo.clone(),
                curriculum_repo.clone(),
                llm,
            )),
            stats_service: Arc::new(StatsService::new(
                summary_repo,
                feedback_repo,
                curriculum_repo.clone(),
            )),
            social_service: Arc::new(SocialService::new(
                SqlxFollowRepository::boxed(pool.clone()),
                user_repo,
            )),
            engagement_service: Arc::new(EngagementService::new(
                curriculum_repo.clone(),
                SqlxLikeRepository::boxed(pool.clone()),
                SqlxBookmarkRepository::boxed(pool.clone()),
                SqlxCommentRepository::boxed(pool.clone()),
            )),
            taxonomy_service: Arc::new(TaxonomyService::new(
                SqlxTagRepository::boxed(pool.clone()),
                SqlxCategoryRepository::boxed(pool.clone()),
                curriculum_repo.clone(),
                cache.clone(),
            )),
            feed_service: Arc::new(FeedService::new(SqlxFeedRepository::boxed(pool.clone()), cache.clone())),
            admin_service: Arc::new(AdminService::new(curriculum_repo, cache)),
            rate_limiter: Arc::new(LoginRateLimiter::new()),
            trust_proxy_headers: false,
            pool,
        }
    }

    pub fn with_trusted_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Authenticated user holding the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new("BAD_GATEWAY", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            "BAD_GATEWAY" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(message = %self.error.message, "Request failed");
        }
        (status, Json(self)).into_response()
    }
}

/// Extract the bearer token from the Authorization header
fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the user a bearer token belongs to
async fn authenticate(state: &AppState, parts: &Parts) -> Result<User, ApiError> {
    let token = extract_bearer_token(parts)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let claims = state
        .user_service
        .tokens()
        .verify_token(token)
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

    match state.user_service.get_by_id(&claims.sub).await {
        Ok(user) => Ok(user),
        Err(UserServiceError::NotFound) => Err(ApiError::unauthorized("Invalid or expired token")),
        Err(e) => Err(ApiError::internal_error(format!("Token validation failed: {}", e))),
    }
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = request.into_parts();
    let user = authenticate(&state, &parts).await?;
    parts.extensions.insert(AuthenticatedUser(user));
    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Admin authorization middleware, layered after [`require_auth`]
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::forbidden("Admin privileges required"));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn parts_with(header_value: Option<&str>) -> Parts {
        let mut builder = axum::http::Request::builder().uri("/test");
        if let Some(value) = header_value {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap().into_parts().0
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(&parts_with(Some("Bearer abc.def"))), Some("abc.def"));
    }

    #[test]
    fn test_extract_bearer_token_rejects_other_schemes() {
        assert!(extract_bearer_token(&parts_with(Some("Basic abc"))).is_none());
        assert!(extract_bearer_token(&parts_with(Some("Bearer   "))).is_none());
        assert!(extract_bearer_token(&parts_with(None)).is_none());
    }

    #[test]
    fn test_status_follows_code() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::new("RATE_LIMIT", "x").status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::bad_gateway("x").status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ApiError::new("SOMETHING_ELSE", "x").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_api_error_with_details() {
        let details = serde_json::json!({"retry_after": 60});
        let error = ApiError::with_details("RATE_LIMIT", "Slow down", details.clone());
        assert_eq!(error.error.details, Some(details));
    }
}
