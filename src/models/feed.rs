use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One public curriculum in the feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub curriculum_id: String,
    pub title: String,
    pub owner_id: String,
    pub owner_name: String,
    pub total_weeks: usize,
    pub total_lessons: usize,
    pub category_name: Option<String>,
    pub category_color: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Feed query: paging plus optional category, tag and text filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFilter {
    pub page: u32,
    pub items_per_page: u32,
    pub category_id: Option<String>,
    /// Every tag must be present on a matching curriculum
    pub tags: Vec<String>,
    pub search: Option<String>,
}

impl FeedFilter {
    pub const DEFAULT_PER_PAGE: u32 = 20;
    pub const MAX_PER_PAGE: u32 = 50;

    /// Build a filter, clamping paging and normalizing the text inputs.
    ///
    /// `tags` is a comma separated list; names are trimmed and lowercased.
    pub fn new(
        page: u32,
        items_per_page: u32,
        category_id: Option<String>,
        tags: Option<&str>,
        search: Option<String>,
    ) -> Self {
        let mut tags: Vec<String> = tags
            .unwrap_or_default()
            .split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        tags.sort();
        tags.dedup();

        Self {
            page: page.max(1),
            items_per_page: items_per_page.clamp(1, Self::MAX_PER_PAGE),
            category_id: category_id.filter(|c| !c.trim().is_empty()),
            tags,
            search: search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.items_per_page as i64
    }

    /// Stable cache key; equal filters map to the same key
    pub fn cache_key(&self) -> String {
        format!(
            "feed:page={}:size={}:category={}:tags={}:search={}",
            self.page,
            self.items_per_page,
            self.category_id.as_deref().unwrap_or(""),
            self.tags.join(","),
            self.search.as_deref().unwrap_or("").to_lowercase(),
        )
    }
}
