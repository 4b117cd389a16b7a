//! Summary repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::Arg;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, Summary};
use crate::with_pool;

/// Summary repository trait
#[async_trait]
pub trait SummaryRepository: Send + Sync {
    async fn create(&self, summary: &Summary) -> Result<()>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Summary>>;

    /// Persist content and updated_at
    async fn update(&self, summary: &Summary) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<bool>;

    /// Summaries for one week, newest first; `owner_id` restricts to one author
    async fn list_by_week(
        &self,
        curriculum_id: &str,
        week_number: i64,
        owner_id: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<Summary>, i64)>;

    /// Summaries for a whole curriculum, newest first
    async fn list_by_curriculum(
        &self,
        curriculum_id: &str,
        owner_id: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<Summary>, i64)>;

    async fn list_by_owner(
        &self,
        owner_id: &str,
        params: &ListParams,
    ) -> Result<(Vec<Summary>, i64)>;

    /// Every summary written by a user, oldest first
    async fn list_all_by_owner(&self, owner_id: &str) -> Result<Vec<Summary>>;
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: String,
    curriculum_id: String,
    week_number: i64,
    owner_id: String,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SummaryRow> for Summary {
    fn from(row: SummaryRow) -> Self {
        Summary {
            id: row.id,
            curriculum_id: row.curriculum_id,
            week_number: row.week_number,
            owner_id: row.owner_id,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SUMMARY_COLUMNS: &str =
    "id, curriculum_id, week_number, owner_id, content, created_at, updated_at";

/// SQLx-based summary repository implementation
pub struct SqlxSummaryRepository {
    pool: DynDatabasePool,
}

impl SqlxSummaryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SummaryRepository> {
        Arc::new(Self::new(pool))
    }

    async fn list_where(
        &self,
        filter: &str,
        args: &[Arg<'_>],
        params: &ListParams,
    ) -> Result<(Vec<Summary>, i64)> {
        let count_sql = format!("SELECT COUNT(*) FROM summaries WHERE {}", filter);
        let list_sql = format!(
            "SELECT {} FROM summaries WHERE {} ORDER BY created_at DESC, id LIMIT ? OFFSET ?",
            SUMMARY_COLUMNS, filter
        );

        let (rows, total) = with_pool!(self.pool, p => {
            let count = bind_args!(sqlx::query_as::<_, (i64,)>(&count_sql), args);
            let list = bind_args!(sqlx::query_as::<_, SummaryRow>(&list_sql), args);
            let (total,) = count.fetch_one(p).await.context("Failed to count summaries")?;
            let rows = list
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to list summaries")?;
            (rows, total)
        });

        Ok((rows.into_iter().map(Summary::from).collect(), total))
    }
}

#[async_trait]
impl SummaryRepository for SqlxSummaryRepository {
    async fn create(&self, summary: &Summary) -> Result<()> {
        with_pool!(self.pool, p => {
            sqlx::query(
                r#"
                INSERT INTO summaries (id, curriculum_id, week_number, owner_id, content, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&summary.id)
            .bind(&summary.curriculum_id)
            .bind(summary.week_number)
            .bind(&summary.owner_id)
            .bind(&summary.content)
            .bind(summary.created_at)
            .bind(summary.updated_at)
            .execute(p)
            .await
            .context("Failed to create summary")?;
        });
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Summary>> {
        let sql = format!("SELECT {} FROM summaries WHERE id = ?", SUMMARY_COLUMNS);
        let row = with_pool!(self.pool, p => {
            sqlx::query_as::<_, SummaryRow>(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get summary")?
        });
        Ok(row.map(Summary::from))
    }

    async fn update(&self, summary: &Summary) -> Result<()> {
        with_pool!(self.pool, p => {
            sqlx::query("UPDATE summaries SET content = ?, updated_at = ? WHERE id = ?")
                .bind(&summary.content)
                .bind(summary.updated_at)
                .bind(&summary.id)
                .execute(p)
                .await
                .context("Failed to update summary")?;
        });
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let affected = with_pool!(self.pool, p => {
            sqlx::query("DELETE FROM summaries WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete summary")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list_by_week(
        &self,
        curriculum_id: &str,
        week_number: i64,
        owner_id: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<Summary>, i64)> {
        match owner_id {
            Some(owner_id) => {
                self.list_where(
                    "curriculum_id = ? AND week_number = ? AND owner_id = ?",
                    &[Arg::Text(curriculum_id), Arg::Int(week_number), Arg::Text(owner_id)],
                    params,
                )
                .await
            }
            None => {
                self.list_where(
                    "curriculum_id = ? AND week_number = ?",
                    &[Arg::Text(curriculum_id), Arg::Int(week_number)],
                    params,
                )
                .await
            }
        }
    }

    async fn list_by_curriculum(
        &self,
        curriculum_id: &str,
        owner_id: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<Summary>, i64)> {
        match owner_id {
            Some(owner_id) => {
                self.list_where(
                    "curriculum_id = ? AND owner_id = ?",
                    &[Arg::Text(curriculum_id), Arg::Text(owner_id)],
                    params,
                )
                .await
            }
            None => {
                self.list_where("curriculum_id = ?", &[Arg::Text(curriculum_id)], params)
                    .await
            }
        }
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        params: &ListParams,
    ) -> Result<(Vec<Summary>, i64)> {
        self.list_where("owner_id = ?", &[Arg::Text(owner_id)], params)
            .await
    }

    async fn list_all_by_owner(&self, owner_id: &str) -> Result<Vec<Summary>> {
        let sql = format!(
            "SELECT {} FROM summaries WHERE owner_id = ? ORDER BY created_at, id",
            SUMMARY_COLUMNS
        );
        let rows = with_pool!(self.pool, p => {
            sqlx::query_as::<_, SummaryRow>(&sql)
                .bind(owner_id)
                .fetch_all(p)
                .await
                .context("Failed to load summaries")?
        });
        Ok(rows.into_iter().map(Summary::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_curriculum, insert_user, setup_pool};
    use crate::models::{SummaryContent, Visibility};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxSummaryRepository) {
        let pool = setup_pool().await;
        let repo = SqlxSummaryRepository::new(pool.clone());
        (pool, repo)
    }

    fn content(seed: &str) -> SummaryContent {
        SummaryContent::parse(&seed.repeat(120)).expect("valid summary content")
    }

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let (pool, repo) = setup_test_repo().await;
        let alice = insert_user(&pool, "alice").await;
        let c = insert_curriculum(&pool, &alice, "Rust basics", Visibility::Private, 2).await;

        let mut summary = Summary::new(&c.id, 1, &alice.id, content("a"));
        repo.create(&summary).await.expect("Failed to create summary");

        let found = repo.get_by_id(&summary.id).await.unwrap().expect("summary");
        assert_eq!(found.week_number, 1);
        assert_eq!(found.content_length(), 120);

        summary.content = "b".repeat(150);
        summary.updated_at = Utc::now();
        repo.update(&summary).await.unwrap();
        let found = repo.get_by_id(&summary.id).await.unwrap().unwrap();
        assert_eq!(found.content_length(), 150);

        assert!(repo.delete(&summary.id).await.unwrap());
        assert!(repo.get_by_id(&summary.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listing_filters() {
        let (pool, repo) = setup_test_repo().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let c = insert_curriculum(&pool, &alice, "Rust basics", Visibility::Public, 2).await;

        repo.create(&Summary::new(&c.id, 1, &alice.id, content("a"))).await.unwrap();
        repo.create(&Summary::new(&c.id, 2, &alice.id, content("b"))).await.unwrap();
        repo.create(&Summary::new(&c.id, 1, &bob.id, content("c"))).await.unwrap();

        let params = ListParams::new(1, 10);
        let (_, total) = repo.list_by_week(&c.id, 1, None, &params).await.unwrap();
        assert_eq!(total, 2);
        let (mine, total) = repo.list_by_week(&c.id, 1, Some(&bob.id), &params).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(mine[0].owner_id, bob.id);

        let (_, total) = repo.list_by_curriculum(&c.id, None, &params).await.unwrap();
        assert_eq!(total, 3);
        let (_, total) = repo.list_by_curriculum(&c.id, Some(&alice.id), &params).await.unwrap();
        assert_eq!(total, 2);

        let (_, total) = repo.list_by_owner(&alice.id, &params).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(repo.list_all_by_owner(&bob.id).await.unwrap().len(), 1);
    }
}
