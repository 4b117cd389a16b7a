//! Common API utilities and shared types

use axum::{
    extract::{FromRequest, FromRequestParts},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::middleware::ApiError;
use crate::models::{ListParams, PagedResult};

/// JSON body whose rejections use the [`ApiError`] envelope
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// Path parameters whose rejections use the [`ApiError`] envelope
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

/// Query string whose rejections use the [`ApiError`] envelope
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

/// Largest `items_per_page` accepted by list endpoints
pub const MAX_ITEMS_PER_PAGE: u32 = 100;

pub fn default_page() -> u32 {
    1
}

pub fn default_items_per_page() -> u32 {
    10
}

/// Pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_items_per_page")]
    pub items_per_page: u32,
}

impl PageQuery {
    /// Validated list parameters, rejecting out-of-range values
    pub fn params(&self) -> Result<ListParams, ApiError> {
        self.params_up_to(MAX_ITEMS_PER_PAGE)
    }

    pub fn params_up_to(&self, max_per_page: u32) -> Result<ListParams, ApiError> {
        Ok(ListParams::checked(self.page, self.items_per_page, max_per_page)?)
    }
}

/// Build `{ total_count, page, items_per_page, <key>: [...] }`
pub fn paged<T: Serialize>(key: &str, result: PagedResult<T>) -> Result<Json<Value>, ApiError> {
    let items = serde_json::to_value(result.items)
        .map_err(|e| ApiError::internal_error(format!("Failed to serialize response: {}", e)))?;

    let mut body = Map::new();
    body.insert("total_count".into(), result.total.into());
    body.insert("page".into(), result.page.into());
    body.insert("items_per_page".into(), result.per_page.into());
    body.insert(key.into(), items);
    Ok(Json(Value::Object(body)))
}
