//! Feed endpoints
//!
//! - GET /api/v1/feed/public - Public curricula, no authentication needed
//! - POST /api/v1/feed/refresh - Clear the feed cache (admin)
//! - POST /api/v1/feed/refresh/{id} - Clear it after one curriculum changed

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::common::{default_page, paged, AppPath, AppQuery};
use crate::api::middleware::{AdminUser, ApiError, AppState, AuthenticatedUser};
use crate::models::{FeedFilter, ListParams};

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_feed_page_size")]
    pub items_per_page: u32,
    pub category_id: Option<String>,
    pub tags: Option<String>,
    pub search: Option<String>,
}

fn default_feed_page_size() -> u32 {
    FeedFilter::DEFAULT_PER_PAGE
}

impl FeedQuery {
    fn filter(self) -> Result<FeedFilter, ApiError> {
        let params = ListParams::checked(self.page, self.items_per_page, FeedFilter::MAX_PER_PAGE)?;
        Ok(FeedFilter::new(
            params.page,
            params.per_page,
            self.category_id,
            self.tags.as_deref(),
            self.search,
        ))
    }
}

/// Routes reachable without a token
pub fn public_router() -> Router<AppState> {
    Router::new().route("/feed/public", get(public_feed))
}

/// Routes behind authentication
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/feed/refresh", post(refresh))
        .route("/feed/refresh/{id}", post(refresh_curriculum))
}

/// GET /api/v1/feed/public
async fn public_feed(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<FeedQuery>,
) -> Result<Json<Value>, ApiError> {
    let filter = query.filter()?;
    paged("curriculums", state.feed_service.public_feed(&filter).await?)
}

/// POST /api/v1/feed/refresh
async fn refresh(State(state): State<AppState>, AdminUser(admin): AdminUser) -> Json<Value> {
    state.feed_service.refresh().await;
    tracing::info!(admin_id = %admin.id, "Feed refresh requested");
    Json(json!({ "message": "Feed cache cleared" }))
}

/// POST /api/v1/feed/refresh/{id}
async fn refresh_curriculum(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    AppPath(id): AppPath<String>,
) -> Json<Value> {
    state.feed_service.refresh_curriculum(&id).await;
    Json(json!({ "message": "Feed cache cleared", "curriculum_id": id }))
}
