//! Feed repository
//!
//! Read model for the public feed: public curricula joined with their owner,
//! category and tags.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use super::{escape_like, Arg, CategoryRepository, SqlxCategoryRepository, SqlxTagRepository, TagRepository};
use crate::db::{placeholders, DynDatabasePool};
use crate::models::{FeedFilter, FeedItem};
use crate::with_pool;

/// Feed repository trait
#[async_trait]
pub trait FeedRepository: Send + Sync {
    /// One page of public curricula matching `filter`, most recently updated first
    async fn list_public(&self, filter: &FeedFilter) -> Result<(Vec<FeedItem>, i64)>;
}

#[derive(sqlx::FromRow)]
struct FeedRow {
    id: String,
    title: String,
    owner_id: String,
    owner_name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// SQLx-based feed repository implementation
pub struct SqlxFeedRepository {
    pool: DynDatabasePool,
    tags: SqlxTagRepository,
    categories: SqlxCategoryRepository,
}

impl SqlxFeedRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self {
            tags: SqlxTagRepository::new(pool.clone()),
            categories: SqlxCategoryRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FeedRepository> {
        Arc::new(Self::new(pool))
    }

    /// Week and lesson totals per curriculum
    async fn week_totals(&self, ids: &[String]) -> Result<HashMap<String, (usize, usize)>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT curriculum_id, lessons FROM week_schedules WHERE curriculum_id IN ({})",
            placeholders(ids.len())
        );
        let rows: Vec<(String, String)> = with_pool!(self.pool, p => {
            let mut query = sqlx::query_as::<_, (String, String)>(&sql);
            for id in ids {
                query = query.bind(id);
            }
            query.fetch_all(p).await.context("Failed to load feed weeks")?
        });

        let mut totals: HashMap<String, (usize, usize)> = HashMap::new();
        for (curriculum_id, lessons) in rows {
            let lessons: Vec<String> =
                serde_json::from_str(&lessons).context("Corrupt lessons column")?;
            let entry = totals.entry(curriculum_id).or_default();
            entry.0 += 1;
            entry.1 += lessons.len();
        }
        Ok(totals)
    }
}

#[async_trait]
impl FeedRepository for SqlxFeedRepository {
    async fn list_public(&self, filter: &FeedFilter) -> Result<(Vec<FeedItem>, i64)> {
        let search = filter
            .search
            .as_ref()
            .map(|s| format!("%{}%", escape_like(&s.to_lowercase())));

        let mut conditions = vec!["c.visibility = 'PUBLIC'".to_string()];
        let mut args: Vec<Arg<'_>> = Vec::new();
        if let Some(category_id) = &filter.category_id {
            conditions.push(
                "c.id IN (SELECT curriculum_id FROM curriculum_categories WHERE category_id = ?)"
                    .to_string(),
            );
            args.push(Arg::Text(category_id));
        }
        if !filter.tags.is_empty() {
            conditions.push(format!(
                "c.id IN (SELECT ct.curriculum_id FROM curriculum_tags ct JOIN tags t ON t.id = ct.tag_id \
                 WHERE t.name IN ({}) GROUP BY ct.curriculum_id HAVING COUNT(DISTINCT t.id) = {})",
                placeholders(filter.tags.len()),
                filter.tags.len()
            ));
            args.extend(filter.tags.iter().map(|t| Arg::Text(t.as_str())));
        }
        if let Some(pattern) = &search {
            conditions.push("(LOWER(c.title) LIKE ? ESCAPE '!' OR LOWER(u.name) LIKE ? ESCAPE '!')".to_string());
            args.push(Arg::Text(pattern));
            args.push(Arg::Text(pattern));
        }

        let from = format!(
            "FROM curriculums c JOIN users u ON u.id = c.owner_id WHERE {}",
            conditions.join(" AND ")
        );
        let count_sql = format!("SELECT COUNT(*) {}", from);
        let list_sql = format!(
            "SELECT c.id, c.title, c.owner_id, u.name AS owner_name, c.created_at, c.updated_at \
             {} ORDER BY c.updated_at DESC, c.id LIMIT ? OFFSET ?",
            from
        );

        let (rows, total) = with_pool!(self.pool, p => {
            let (total,) = bind_args!(sqlx::query_as::<_, (i64,)>(&count_sql), &args)
                .fetch_one(p)
                .await
                .context("Failed to count feed")?;
            let rows = bind_args!(sqlx::query_as::<_, FeedRow>(&list_sql), &args)
                .bind(filter.items_per_page as i64)
                .bind(filter.offset())
                .fetch_all(p)
                .await
                .context("Failed to load feed")?;
            (rows, total)
        });

        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let totals = self.week_totals(&ids).await?;
        let mut tags = self.tags.tag_names_for_curricula(&ids).await?;
        let mut categories = self.categories.categories_for_curricula(&ids).await?;

        let items = rows
            .into_iter()
            .map(|row| {
                let (total_weeks, total_lessons) = totals.get(&row.id).copied().unwrap_or_default();
                let category = categories.remove(&row.id);
                FeedItem {
                    tags: tags.remove(&row.id).unwrap_or_default(),
                    category_name: category.as_ref().map(|c| c.name.clone()),
                    category_color: category.map(|c| c.color),
                    curriculum_id: row.id,
                    title: row.title,
                    owner_id: row.owner_id,
                    owner_name: row.owner_name,
                    total_weeks,
                    total_lessons,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                }
            })
            .collect();
        Ok((items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_curriculum, insert_user, setup_pool};
    use crate::models::{Category, CategoryName, Tag, TagColor, TagName, Visibility};

    #[tokio::test]
    async fn test_feed_lists_public_only_with_details() {
        let pool = setup_pool().await;
        let repo = SqlxFeedRepository::new(pool.clone());
        let alice = insert_user(&pool, "alice").await;
        let public = insert_curriculum(&pool, &alice, "Rust basics", Visibility::Public, 3).await;
        insert_curriculum(&pool, &alice, "Secret plan", Visibility::Private, 1).await;

        let tags = SqlxTagRepository::new(pool.clone());
        let tag = Tag::new(TagName::parse("rust").unwrap(), &alice.id);
        tags.create(&tag).await.unwrap();
        tags.attach(&public.id, &tag.id, &alice.id).await.unwrap();

        let categories = SqlxCategoryRepository::new(pool.clone());
        let category = Category::new(
            CategoryName::parse("Programming").unwrap(),
            None,
            TagColor::parse("#112233").unwrap(),
            None,
            1,
        );
        categories.create(&category).await.unwrap();
        categories.assign(&public.id, &category.id, &alice.id).await.unwrap();

        let (items, total) = repo
            .list_public(&FeedFilter::new(1, 20, None, None, None))
            .await
            .unwrap();
        assert_eq!(total, 1);
        let item = &items[0];
        assert_eq!(item.owner_name, "alice");
        assert_eq!(item.total_weeks, 3);
        assert_eq!(item.total_lessons, 6);
        assert_eq!(item.tags, vec!["rust"]);
        assert_eq!(item.category_name.as_deref(), Some("Programming"));
        assert_eq!(item.category_color.as_deref(), Some("#112233"));

        let (_, total) = repo
            .list_public(&FeedFilter::new(1, 20, Some(category.id.clone()), Some("rust"), None))
            .await
            .unwrap();
        assert_eq!(total, 1);
        let (_, total) = repo
            .list_public(&FeedFilter::new(1, 20, None, Some("rust,web"), None))
            .await
            .unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_feed_search_matches_title_or_owner() {
        let pool = setup_pool().await;
        let repo = SqlxFeedRepository::new(pool.clone());
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        insert_curriculum(&pool, &alice, "Rust basics", Visibility::Public, 1).await;
        insert_curriculum(&pool, &bob, "Cooking", Visibility::Public, 1).await;

        let search = |q: &str| FeedFilter::new(1, 20, None, None, Some(q.to_string()));
        let (items, _) = repo.list_public(&search("RUST")).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Rust basics");

        let (items, _) = repo.list_public(&search("bo")).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].owner_name, "bob");

        let (items, total) = repo
            .list_public(&FeedFilter::new(2, 1, None, None, None))
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_feed_search_treats_wildcards_literally() {
        let pool = setup_pool().await;
        let repo = SqlxFeedRepository::new(pool.clone());
        let alice = insert_user(&pool, "alice").await;
        insert_curriculum(&pool, &alice, "100% Rust", Visibility::Public, 1).await;
        insert_curriculum(&pool, &alice, "1000 Rust drills", Visibility::Public, 1).await;

        let search = |q: &str| FeedFilter::new(1, 20, None, None, Some(q.to_string()));
        let (items, _) = repo.list_public(&search("100%")).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "100% Rust");

        let (_, total) = repo.list_public(&search("_")).await.unwrap();
        assert_eq!(total, 0);
    }
}
