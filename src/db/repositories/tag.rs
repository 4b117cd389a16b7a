//! Tag repository
//!
//! Tags and their attachment to curricula. `usage_count` mirrors the number of
//! `curriculum_tags` rows and is adjusted in the same transaction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::{escape_like, viewable_filter, Arg};
use crate::db::{placeholders, DynDatabasePool};
use crate::models::{ListParams, Tag};
use crate::with_pool;

/// Aggregate tag counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TagCounts {
    pub total: i64,
    pub popular: i64,
    pub unused: i64,
}

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn create(&self, tag: &Tag) -> Result<()>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Tag>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// Persist name and updated_at
    async fn update(&self, tag: &Tag) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<bool>;

    /// Tags by usage, optionally filtered by a case-insensitive substring
    async fn list(&self, search: Option<&str>, params: &ListParams) -> Result<(Vec<Tag>, i64)>;

    async fn popular(&self, limit: i64, min_usage: i64) -> Result<Vec<Tag>>;

    /// Tags whose name starts with `prefix`, most used first
    async fn search_prefix(&self, prefix: &str, limit: i64) -> Result<Vec<Tag>>;

    async fn counts(&self) -> Result<TagCounts>;

    async fn tags_for_curriculum(&self, curriculum_id: &str) -> Result<Vec<Tag>>;

    /// Tag names per curriculum id, sorted by name
    async fn tag_names_for_curricula(&self, ids: &[String]) -> Result<HashMap<String, Vec<String>>>;

    /// Attach a tag and bump its usage count
    async fn attach(&self, curriculum_id: &str, tag_id: &str, added_by: &str) -> Result<()>;

    /// Detach a tag and release its usage; false when it was not attached
    async fn detach(&self, curriculum_id: &str, tag_id: &str) -> Result<bool>;

    /// Ids of curricula carrying every one of `names`, most recently updated first.
    /// `viewer` limits results to what that user may see; `None` sees all.
    async fn curriculum_ids_with_all_tags(
        &self,
        names: &[String],
        viewer: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<String>, i64)>;
}

#[derive(sqlx::FromRow)]
struct TagRow {
    id: String,
    name: String,
    usage_count: i64,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TagRow> for Tag {
    fn from(row: TagRow) -> Self {
        Tag {
            id: row.id,
            name: row.name,
            usage_count: row.usage_count,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_TAG: &str =
    "SELECT t.id, t.name, t.usage_count, t.created_by, t.created_at, t.updated_at FROM tags t";

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch(&self, sql: &str, args: &[Arg<'_>]) -> Result<Vec<Tag>> {
        let rows = with_pool!(self.pool, p => {
            bind_args!(sqlx::query_as::<_, TagRow>(sql), args)
                .fetch_all(p)
                .await
                .context("Failed to query tags")?
        });
        Ok(rows.into_iter().map(Tag::from).collect())
    }

    async fn count(&self, sql: &str, args: &[Arg<'_>]) -> Result<i64> {
        let count = with_pool!(self.pool, p => {
            let (count,) = bind_args!(sqlx::query_as::<_, (i64,)>(sql), args)
                .fetch_one(p)
                .await
                .context("Failed to count tags")?;
            count
        });
        Ok(count)
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, tag: &Tag) -> Result<()> {
        with_pool!(self.pool, p => {
            sqlx::query(
                r#"
                INSERT INTO tags (id, name, usage_count, created_by, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&tag.id)
            .bind(&tag.name)
            .bind(tag.usage_count)
            .bind(&tag.created_by)
            .bind(tag.created_at)
            .bind(tag.updated_at)
            .execute(p)
            .await
            .context("Failed to create tag")?;
        });
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Tag>> {
        let sql = format!("{} WHERE t.id = ?", SELECT_TAG);
        Ok(self.fetch(&sql, &[Arg::Text(id)]).await?.pop())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let sql = format!("{} WHERE t.name = ?", SELECT_TAG);
        Ok(self.fetch(&sql, &[Arg::Text(name)]).await?.pop())
    }

    async fn update(&self, tag: &Tag) -> Result<()> {
        with_pool!(self.pool, p => {
            sqlx::query("UPDATE tags SET name = ?, updated_at = ? WHERE id = ?")
                .bind(&tag.name)
                .bind(tag.updated_at)
                .bind(&tag.id)
                .execute(p)
                .await
                .context("Failed to update tag")?;
        });
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let affected = with_pool!(self.pool, p => {
            sqlx::query("DELETE FROM tags WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete tag")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list(&self, search: Option<&str>, params: &ListParams) -> Result<(Vec<Tag>, i64)> {
        let pattern = search.map(|s| format!("%{}%", escape_like(&s.trim().to_lowercase())));
        let (filter, mut args) = match &pattern {
            Some(pattern) => ("WHERE t.name LIKE ? ESCAPE '!'", vec![Arg::Text(pattern.as_str())]),
            None => ("", Vec::new()),
        };

        let total = self
            .count(&format!("SELECT COUNT(*) FROM tags t {}", filter), &args)
            .await?;

        args.push(Arg::Int(params.limit()));
        args.push(Arg::Int(params.offset()));
        let sql = format!(
            "{} {} ORDER BY t.usage_count DESC, t.name LIMIT ? OFFSET ?",
            SELECT_TAG, filter
        );
        Ok((self.fetch(&sql, &args).await?, total))
    }

    async fn popular(&self, limit: i64, min_usage: i64) -> Result<Vec<Tag>> {
        let sql = format!(
            "{} WHERE t.usage_count >= ? ORDER BY t.usage_count DESC, t.name LIMIT ?",
            SELECT_TAG
        );
        self.fetch(&sql, &[Arg::Int(min_usage), Arg::Int(limit)]).await
    }

    async fn search_prefix(&self, prefix: &str, limit: i64) -> Result<Vec<Tag>> {
        let pattern = format!("{}%", escape_like(&prefix.trim().to_lowercase()));
        let sql = format!(
            "{} WHERE t.name LIKE ? ESCAPE '!' ORDER BY t.usage_count DESC, t.name LIMIT ?",
            SELECT_TAG
        );
        self.fetch(&sql, &[Arg::Text(&pattern), Arg::Int(limit)]).await
    }

    async fn counts(&self) -> Result<TagCounts> {
        Ok(TagCounts {
            total: self.count("SELECT COUNT(*) FROM tags", &[]).await?,
            popular: self
                .count(
                    "SELECT COUNT(*) FROM tags WHERE usage_count >= ?",
                    &[Arg::Int(Tag::POPULAR_THRESHOLD)],
                )
                .await?,
            unused: self
                .count("SELECT COUNT(*) FROM tags WHERE usage_count = 0", &[])
                .await?,
        })
    }

    async fn tags_for_curriculum(&self, curriculum_id: &str) -> Result<Vec<Tag>> {
        let sql = format!(
            "{} JOIN curriculum_tags ct ON ct.tag_id = t.id WHERE ct.curriculum_id = ? ORDER BY t.name",
            SELECT_TAG
        );
        self.fetch(&sql, &[Arg::Text(curriculum_id)]).await
    }

    async fn tag_names_for_curricula(&self, ids: &[String]) -> Result<HashMap<String, Vec<String>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT ct.curriculum_id, t.name FROM curriculum_tags ct JOIN tags t ON t.id = ct.tag_id \
             WHERE ct.curriculum_id IN ({}) ORDER BY t.name",
            placeholders(ids.len())
        );
        let rows: Vec<(String, String)> = with_pool!(self.pool, p => {
            let mut query = sqlx::query_as::<_, (String, String)>(&sql);
            for id in ids {
                query = query.bind(id);
            }
            query.fetch_all(p).await.context("Failed to load curriculum tags")?
        });

        let mut names: HashMap<String, Vec<String>> = HashMap::new();
        for (curriculum_id, name) in rows {
            names.entry(curriculum_id).or_default().push(name);
        }
        Ok(names)
    }

    async fn attach(&self, curriculum_id: &str, tag_id: &str, added_by: &str) -> Result<()> {
        let now = Utc::now();
        with_pool!(self.pool, p => {
            let mut tx = p.begin().await.context("Failed to begin transaction")?;
            sqlx::query(
                "INSERT INTO curriculum_tags (curriculum_id, tag_id, added_by, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(curriculum_id)
            .bind(tag_id)
            .bind(added_by)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to attach tag")?;
            sqlx::query("UPDATE tags SET usage_count = usage_count + 1, updated_at = ? WHERE id = ?")
                .bind(now)
                .bind(tag_id)
                .execute(&mut *tx)
                .await
                .context("Failed to bump tag usage")?;
            tx.commit().await.context("Failed to commit tag attach")?;
        });
        Ok(())
    }

    async fn detach(&self, curriculum_id: &str, tag_id: &str) -> Result<bool> {
        let now = Utc::now();
        let removed = with_pool!(self.pool, p => {
            let mut tx = p.begin().await.context("Failed to begin transaction")?;
            let affected = sqlx::query("DELETE FROM curriculum_tags WHERE curriculum_id = ? AND tag_id = ?")
                .bind(curriculum_id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await
                .context("Failed to detach tag")?
                .rows_affected();
            if affected > 0 {
                sqlx::query(
                    "UPDATE tags SET usage_count = usage_count - 1, updated_at = ? WHERE id = ? AND usage_count > 0",
                )
                .bind(now)
                .bind(tag_id)
                .execute(&mut *tx)
                .await
                .context("Failed to release tag usage")?;
            }
            tx.commit().await.context("Failed to commit tag detach")?;
            affected > 0
        });
        Ok(removed)
    }

    async fn curriculum_ids_with_all_tags(
        &self,
        names: &[String],
        viewer: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<String>, i64)> {
        if names.is_empty() {
            return Ok((Vec::new(), 0));
        }
        let mut args: Vec<Arg<'_>> = names.iter().map(|n| Arg::Text(n.as_str())).collect();
        let viewable = viewable_filter(viewer, &mut args);
        let filter = format!(
            "c.id IN (SELECT ct.curriculum_id FROM curriculum_tags ct JOIN tags t ON t.id = ct.tag_id \
             WHERE t.name IN ({}) GROUP BY ct.curriculum_id HAVING COUNT(DISTINCT t.id) = {}) AND {}",
            placeholders(names.len()),
            names.len(),
            viewable
        );

        let count_sql = format!("SELECT COUNT(*) FROM curriculums c WHERE {}", filter);
        let list_sql = format!(
            "SELECT c.id FROM curriculums c WHERE {} ORDER BY c.updated_at DESC, c.id LIMIT ? OFFSET ?",
            filter
        );
        let (ids, total) = with_pool!(self.pool, p => {
            let (total,) = bind_args!(sqlx::query_as::<_, (i64,)>(&count_sql), &args)
                .fetch_one(p)
                .await
                .context("Failed to count tagged curricula")?;
            let rows = bind_args!(sqlx::query_as::<_, (String,)>(&list_sql), &args)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to search curricula by tags")?;
            (rows.into_iter().map(|(id,)| id).collect::<Vec<_>>(), total)
        });
        Ok((ids, total))
    }
}
