//! Comment repository
//!
//! Author names are joined from `users` on read and never stored.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::DynDatabasePool;
use crate::models::{Comment, ListParams};
use crate::with_pool;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, comment: &Comment) -> Result<()>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Comment>>;

    /// Persist content and updated_at
    async fn update(&self, comment: &Comment) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<bool>;

    /// Comments on a curriculum, oldest first
    async fn list_by_curriculum(
        &self,
        curriculum_id: &str,
        params: &ListParams,
    ) -> Result<(Vec<Comment>, i64)>;

    /// Comments written by a user, newest first
    async fn list_by_user(&self, user_id: &str, params: &ListParams) -> Result<(Vec<Comment>, i64)>;

    async fn count_by_curriculum(&self, curriculum_id: &str) -> Result<i64>;

    async fn count_by_user(&self, user_id: &str) -> Result<i64>;

    /// Comments on curricula owned by `owner_id`
    async fn count_received(&self, owner_id: &str) -> Result<i64>;
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: String,
    curriculum_id: String,
    user_id: String,
    user_name: String,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            curriculum_id: row.curriculum_id,
            user_id: row.user_id,
            user_name: row.user_name,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_COMMENT: &str = "SELECT c.id, c.curriculum_id, c.user_id, u.name AS user_name, \
     c.content, c.created_at, c.updated_at FROM comments c JOIN users u ON u.id = c.user_id";

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }

    async fn count(&self, filter: &str, value: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM comments c WHERE {}", filter);
        let count = with_pool!(self.pool, p => {
            let (count,): (i64,) = sqlx::query_as(&sql)
                .bind(value)
                .fetch_one(p)
                .await
                .context("Failed to count comments")?;
            count
        });
        Ok(count)
    }

    async fn list(
        &self,
        filter: &str,
        order: &str,
        value: &str,
        params: &ListParams,
    ) -> Result<(Vec<Comment>, i64)> {
        let total = self.count(filter, value).await?;
        let sql = format!(
            "{} WHERE {} ORDER BY {}, c.id LIMIT ? OFFSET ?",
            SELECT_COMMENT, filter, order
        );
        let rows = with_pool!(self.pool, p => {
            sqlx::query_as::<_, CommentRow>(&sql)
                .bind(value)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to list comments")?
        });
        Ok((rows.into_iter().map(Comment::from).collect(), total))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &Comment) -> Result<()> {
        with_pool!(self.pool, p => {
            sqlx::query(
                r#"
                INSERT INTO comments (id, curriculum_id, user_id, content, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&comment.id)
            .bind(&comment.curriculum_id)
            .bind(&comment.user_id)
            .bind(&comment.content)
            .bind(comment.created_at)
            .bind(comment.updated_at)
            .execute(p)
            .await
            .context("Failed to create comment")?;
        });
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Comment>> {
        let sql = format!("{} WHERE c.id = ?", SELECT_COMMENT);
        let row = with_pool!(self.pool, p => {
            sqlx::query_as::<_, CommentRow>(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get comment")?
        });
        Ok(row.map(Comment::from))
    }

    async fn update(&self, comment: &Comment) -> Result<()> {
        with_pool!(self.pool, p => {
            sqlx::query("UPDATE comments SET content = ?, updated_at = ? WHERE id = ?")
                .bind(&comment.content)
                .bind(comment.updated_at)
                .bind(&comment.id)
                .execute(p)
                .await
                .context("Failed to update comment")?;
        });
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let affected = with_pool!(self.pool, p => {
            sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete comment")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list_by_curriculum(
        &self,
        curriculum_id: &str,
        params: &ListParams,
    ) -> Result<(Vec<Comment>, i64)> {
        self.list("c.curriculum_id = ?", "c.created_at", curriculum_id, params)
            .await
    }

    async fn list_by_user(&self, user_id: &str, params: &ListParams) -> Result<(Vec<Comment>, i64)> {
        self.list("c.user_id = ?", "c.created_at DESC", user_id, params)
            .await
    }

    async fn count_by_curriculum(&self, curriculum_id: &str) -> Result<i64> {
        self.count("c.curriculum_id = ?", curriculum_id).await
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        self.count("c.user_id = ?", user_id).await
    }

    async fn count_received(&self, owner_id: &str) -> Result<i64> {
        self.count(
            "c.curriculum_id IN (SELECT id FROM curriculums WHERE owner_id = ?)",
            owner_id,
        )
        .await
    }
}
