//! Feed service
//!
//! Serves the public feed from the cache when possible. Every filtered page is
//! cached under its own `feed:` key, so any change to a curriculum that can
//! appear in the feed drops all of them.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::FeedRepository;
use crate::models::{FeedFilter, FeedItem, PagedResult};
use std::sync::Arc;
use std::time::Duration;

/// Glob matching every cached feed page
pub const FEED_CACHE_PATTERN: &str = "feed:*";

/// Drop every cached feed page.
///
/// Cache failures are logged and swallowed; a stale page expires with its TTL.
pub async fn invalidate_feed(cache: &MemoryCache) {
    if let Err(e) = cache.delete_pattern(FEED_CACHE_PATTERN).await {
        tracing::warn!(error = %e, "Failed to invalidate feed cache");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedServiceError {
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct FeedService {
    feed_repo: Arc<dyn FeedRepository>,
    cache: Arc<MemoryCache>,
    cache_ttl: Duration,
}

impl FeedService {
    pub fn new(feed_repo: Arc<dyn FeedRepository>, cache: Arc<MemoryCache>) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            feed_repo,
            cache,
            cache_ttl,
        }
    }

    pub async fn public_feed(&self, filter: &FeedFilter) -> Result<PagedResult<FeedItem>, FeedServiceError> {
        let key = filter.cache_key();
        if let Ok(Some(cached)) = self.cache.get::<PagedResult<FeedItem>>(&key).await {
            tracing::debug!(key = %key, "Feed cache hit");
            return Ok(cached);
        }

        let (items, total) = self.feed_repo.list_public(filter).await?;
        let page = PagedResult {
            items,
            total,
            page: filter.page,
            per_page: filter.items_per_page,
        };
        if let Err(e) = self.cache.set(&key, &page, self.cache_ttl).await {
            tracing::warn!(error = %e, "Failed to cache feed page");
        }
        Ok(page)
    }

    /// Clear the whole feed cache
    pub async fn refresh(&self) {
        invalidate_feed(&self.cache).await;
        tracing::info!("Feed cache cleared");
    }

    /// Clear cached pages after `curriculum_id` changed.
    ///
    /// A curriculum can sit on any page of any filter, so this clears the
    /// same set of keys as [`FeedService::refresh`].
    pub async fn refresh_curriculum(&self, curriculum_id: &str) {
        invalidate_feed(&self.cache).await;
        tracing::info!(curriculum_id = %curriculum_id, "Feed cache cleared for curriculum");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_curriculum, insert_user, setup_pool};
    use crate::db::repositories::SqlxFeedRepository;
    use crate::models::Visibility;

    #[tokio::test]
    async fn test_feed_pages_are_cached_until_refresh() {
        let pool = setup_pool().await;
        let cache = Arc::new(MemoryCache::new());
        let service = FeedService::new(SqlxFeedRepository::boxed(pool.clone()), cache.clone());
        let alice = insert_user(&pool, "alice").await;
        insert_curriculum(&pool, &alice, "Rust basics", Visibility::Public, 2).await;

        let filter = FeedFilter::new(1, 20, None, None, None);
        let first = service.public_feed(&filter).await.unwrap();
        assert_eq!(first.total, 1);

        insert_curriculum(&pool, &alice, "Go basics", Visibility::Public, 1).await;
        let cached = service.public_feed(&filter).await.unwrap();
        assert_eq!(cached.total, 1, "second read should come from the cache");

        service.refresh().await;
        let fresh = service.public_feed(&filter).await.unwrap();
        assert_eq!(fresh.total, 2);
    }

    #[tokio::test]
    async fn test_invalidate_feed_keeps_other_keys() {
        let cache = MemoryCache::new();
        cache.set("feed:page=1", &1, cache.default_ttl()).await.unwrap();
        cache.set("profile:x", &2, cache.default_ttl()).await.unwrap();

        invalidate_feed(&cache).await;

        assert_eq!(cache.get::<i32>("feed:page=1").await.unwrap(), None);
        assert_eq!(cache.get::<i32>("profile:x").await.unwrap(), Some(2));
    }
}
