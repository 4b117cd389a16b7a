//! Like and bookmark repositories
//!
//! Both tables share one shape (`id, curriculum_id, user_id, created_at`,
//! unique per user and curriculum), so the SQL lives in [`MarkTable`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::DynDatabasePool;
use crate::models::{Bookmark, Like, ListParams};
use crate::with_pool;

/// Like repository trait
#[async_trait]
pub trait LikeRepository: Send + Sync {
    async fn create(&self, like: &Like) -> Result<()>;

    async fn delete(&self, curriculum_id: &str, user_id: &str) -> Result<bool>;

    async fn exists(&self, curriculum_id: &str, user_id: &str) -> Result<bool>;

    async fn count_by_curriculum(&self, curriculum_id: &str) -> Result<i64>;

    /// Likes given by a user
    async fn count_by_user(&self, user_id: &str) -> Result<i64>;

    /// Likes on curricula owned by `owner_id`
    async fn count_received(&self, owner_id: &str) -> Result<i64>;

    async fn list_by_curriculum(
        &self,
        curriculum_id: &str,
        params: &ListParams,
    ) -> Result<(Vec<Like>, i64)>;

    async fn list_by_user(&self, user_id: &str, params: &ListParams) -> Result<(Vec<Like>, i64)>;
}

/// Bookmark repository trait
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    async fn create(&self, bookmark: &Bookmark) -> Result<()>;

    async fn delete(&self, curriculum_id: &str, user_id: &str) -> Result<bool>;

    async fn exists(&self, curriculum_id: &str, user_id: &str) -> Result<bool>;

    async fn count_by_curriculum(&self, curriculum_id: &str) -> Result<i64>;

    async fn count_by_user(&self, user_id: &str) -> Result<i64>;

    async fn list_by_user(
        &self,
        user_id: &str,
        params: &ListParams,
    ) -> Result<(Vec<Bookmark>, i64)>;
}

#[derive(sqlx::FromRow)]
struct MarkRow {
    id: String,
    curriculum_id: String,
    user_id: String,
    created_at: DateTime<Utc>,
}

impl From<MarkRow> for Like {
    fn from(row: MarkRow) -> Self {
        Like {
            id: row.id,
            curriculum_id: row.curriculum_id,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

impl From<MarkRow> for Bookmark {
    fn from(row: MarkRow) -> Self {
        Bookmark {
            id: row.id,
            curriculum_id: row.curriculum_id,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

/// Queries over a `likes`-shaped table
struct MarkTable {
    pool: DynDatabasePool,
    table: &'static str,
}

impl MarkTable {
    async fn insert(
        &self,
        id: &str,
        curriculum_id: &str,
        user_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (id, curriculum_id, user_id, created_at) VALUES (?, ?, ?, ?)",
            self.table
        );
        with_pool!(self.pool, p => {
            sqlx::query(&sql)
                .bind(id)
                .bind(curriculum_id)
                .bind(user_id)
                .bind(created_at)
                .execute(p)
                .await
                .with_context(|| format!("Failed to insert into {}", self.table))?;
        });
        Ok(())
    }

    async fn delete(&self, curriculum_id: &str, user_id: &str) -> Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE curriculum_id = ? AND user_id = ?",
            self.table
        );
        let affected = with_pool!(self.pool, p => {
            sqlx::query(&sql)
                .bind(curriculum_id)
                .bind(user_id)
                .execute(p)
                .await
                .with_context(|| format!("Failed to delete from {}", self.table))?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    /// `COUNT(*)` with a filter that binds exactly one value
    async fn count(&self, filter: &str, value: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {} m WHERE {}", self.table, filter);
        let count = with_pool!(self.pool, p => {
            let (count,): (i64,) = sqlx::query_as(&sql)
                .bind(value)
                .fetch_one(p)
                .await
                .with_context(|| format!("Failed to count {}", self.table))?;
            count
        });
        Ok(count)
    }

    async fn exists(&self, curriculum_id: &str, user_id: &str) -> Result<bool> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE curriculum_id = ? AND user_id = ?",
            self.table
        );
        let count = with_pool!(self.pool, p => {
            let (count,): (i64,) = sqlx::query_as(&sql)
                .bind(curriculum_id)
                .bind(user_id)
                .fetch_one(p)
                .await
                .with_context(|| format!("Failed to check {}", self.table))?;
            count
        });
        Ok(count > 0)
    }

    async fn count_received(&self, owner_id: &str) -> Result<i64> {
        self.count(
            "m.curriculum_id IN (SELECT id FROM curriculums WHERE owner_id = ?)",
            owner_id,
        )
        .await
    }

    /// Newest first, filtered on one column
    async fn list(
        &self,
        column: &'static str,
        value: &str,
        params: &ListParams,
    ) -> Result<(Vec<MarkRow>, i64)> {
        let total = self.count(&format!("m.{} = ?", column), value).await?;
        let sql = format!(
            "SELECT id, curriculum_id, user_id, created_at FROM {} WHERE {} = ? \
             ORDER BY created_at DESC, id LIMIT ? OFFSET ?",
            self.table, column
        );
        let rows = with_pool!(self.pool, p => {
            sqlx::query_as::<_, MarkRow>(&sql)
                .bind(value)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .with_context(|| format!("Failed to list {}", self.table))?
        });
        Ok((rows, total))
    }
}

/// SQLx-based like repository implementation
pub struct SqlxLikeRepository {
    table: MarkTable,
}

impl SqlxLikeRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self {
            table: MarkTable {
                pool,
                table: "likes",
            },
        }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LikeRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LikeRepository for SqlxLikeRepository {
    async fn create(&self, like: &Like) -> Result<()> {
        self.table
            .insert(&like.id, &like.curriculum_id, &like.user_id, like.created_at)
            .await
    }

    async fn delete(&self, curriculum_id: &str, user_id: &str) -> Result<bool> {
        self.table.delete(curriculum_id, user_id).await
    }

    async fn exists(&self, curriculum_id: &str, user_id: &str) -> Result<bool> {
        self.table.exists(curriculum_id, user_id).await
    }

    async fn count_by_curriculum(&self, curriculum_id: &str) -> Result<i64> {
        self.table.count("m.curriculum_id = ?", curriculum_id).await
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        self.table.count("m.user_id = ?", user_id).await
    }

    async fn count_received(&self, owner_id: &str) -> Result<i64> {
        self.table.count_received(owner_id).await
    }

    async fn list_by_curriculum(
        &self,
        curriculum_id: &str,
        params: &ListParams,
    ) -> Result<(Vec<Like>, i64)> {
        let (rows, total) = self.table.list("curriculum_id", curriculum_id, params).await?;
        Ok((rows.into_iter().map(Like::from).collect(), total))
    }

    async fn list_by_user(&self, user_id: &str, params: &ListParams) -> Result<(Vec<Like>, i64)> {
        let (rows, total) = self.table.list("user_id", user_id, params).await?;
        Ok((rows.into_iter().map(Like::from).collect(), total))
    }
}

/// SQLx-based bookmark repository implementation
pub struct SqlxBookmarkRepository {
    table: MarkTable,
}

impl SqlxBookmarkRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self {
            table: MarkTable {
                pool,
                table: "bookmarks",
            },
        }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BookmarkRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl BookmarkRepository for SqlxBookmarkRepository {
    async fn create(&self, bookmark: &Bookmark) -> Result<()> {
        self.table
            .insert(
                &bookmark.id,
                &bookmark.curriculum_id,
                &bookmark.user_id,
                bookmark.created_at,
            )
            .await
    }

    async fn delete(&self, curriculum_id: &str, user_id: &str) -> Result<bool> {
        self.table.delete(curriculum_id, user_id).await
    }

    async fn exists(&self, curriculum_id: &str, user_id: &str) -> Result<bool> {
        self.table.exists(curriculum_id, user_id).await
    }

    async fn count_by_curriculum(&self, curriculum_id: &str) -> Result<i64> {
        self.table.count("m.curriculum_id = ?", curriculum_id).await
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        self.table.count("m.user_id = ?", user_id).await
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        params: &ListParams,
    ) -> Result<(Vec<Bookmark>, i64)> {
        let (rows, total) = self.table.list("user_id", user_id, params).await?;
        Ok((rows.into_iter().map(Bookmark::from).collect(), total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_curriculum, insert_user, setup_pool};
    use crate::models::Visibility;

    #[tokio::test]
    async fn test_like_lifecycle() {
        let pool = setup_pool().await;
        let repo = SqlxLikeRepository::new(pool.clone());
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let c = insert_curriculum(&pool, &alice, "Rust basics", Visibility::Public, 1).await;

        repo.create(&Like::new(&c.id, &bob.id)).await.expect("Failed to like");
        assert!(repo.create(&Like::new(&c.id, &bob.id)).await.is_err());
        assert!(repo.exists(&c.id, &bob.id).await.unwrap());
        assert_eq!(repo.count_by_curriculum(&c.id).await.unwrap(), 1);
        assert_eq!(repo.count_by_user(&bob.id).await.unwrap(), 1);
        assert_eq!(repo.count_received(&alice.id).await.unwrap(), 1);
        assert_eq!(repo.count_received(&bob.id).await.unwrap(), 0);

        let (likes, total) = repo.list_by_curriculum(&c.id, &ListParams::new(1, 10)).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(likes[0].user_id, bob.id);

        assert!(repo.delete(&c.id, &bob.id).await.unwrap());
        assert!(!repo.delete(&c.id, &bob.id).await.unwrap());
        assert!(!repo.exists(&c.id, &bob.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_bookmarks_are_independent_of_likes() {
        let pool = setup_pool().await;
        let likes = SqlxLikeRepository::new(pool.clone());
        let bookmarks = SqlxBookmarkRepository::new(pool.clone());
        let alice = insert_user(&pool, "alice").await;
        let c1 = insert_curriculum(&pool, &alice, "First", Visibility::Public, 1).await;
        let c2 = insert_curriculum(&pool, &alice, "Second", Visibility::Public, 1).await;

        bookmarks.create(&Bookmark::new(&c1.id, &alice.id)).await.unwrap();
        bookmarks.create(&Bookmark::new(&c2.id, &alice.id)).await.unwrap();

        assert_eq!(bookmarks.count_by_user(&alice.id).await.unwrap(), 2);
        assert_eq!(likes.count_by_user(&alice.id).await.unwrap(), 0);

        let (page, total) = bookmarks
            .list_by_user(&alice.id, &ListParams::new(1, 1))
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
    }
}
