//! Feedback repository
//!
//! A summary has at most one feedback; owner and curriculum lookups go
//! through the `summaries` table.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::Arg;
use crate::db::DynDatabasePool;
use crate::models::{Feedback, ListParams};
use crate::with_pool;

/// Feedback repository trait
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    async fn create(&self, feedback: &Feedback) -> Result<()>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Feedback>>;

    async fn get_by_summary_id(&self, summary_id: &str) -> Result<Option<Feedback>>;

    async fn delete(&self, id: &str) -> Result<bool>;

    /// Feedback on a curriculum's summaries, newest first; `owner_id` limits to one author
    async fn list_by_curriculum(
        &self,
        curriculum_id: &str,
        owner_id: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<Feedback>, i64)>;

    /// Feedback on a user's summaries with an optional inclusive score range
    async fn list_by_owner(
        &self,
        owner_id: &str,
        min_score: Option<f64>,
        max_score: Option<f64>,
        params: &ListParams,
    ) -> Result<(Vec<Feedback>, i64)>;

    /// Every feedback on a user's summaries, oldest first
    async fn list_all_by_owner(&self, owner_id: &str) -> Result<Vec<Feedback>>;
}

#[derive(sqlx::FromRow)]
struct FeedbackRow {
    id: String,
    summary_id: String,
    comment: String,
    score: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FeedbackRow> for Feedback {
    fn from(row: FeedbackRow) -> Self {
        Feedback {
            id: row.id,
            summary_id: row.summary_id,
            comment: row.comment,
            score: row.score,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const FEEDBACK_COLUMNS: &str = "f.id, f.summary_id, f.comment, f.score, f.created_at, f.updated_at";

/// SQLx-based feedback repository implementation
pub struct SqlxFeedbackRepository {
    pool: DynDatabasePool,
}

impl SqlxFeedbackRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FeedbackRepository> {
        Arc::new(Self::new(pool))
    }

    async fn find_one(&self, column: &'static str, value: &str) -> Result<Option<Feedback>> {
        let sql = format!("SELECT {} FROM feedbacks f WHERE f.{} = ?", FEEDBACK_COLUMNS, column);
        let row = with_pool!(self.pool, p => {
            sqlx::query_as::<_, FeedbackRow>(&sql)
                .bind(value)
                .fetch_optional(p)
                .await
                .context("Failed to get feedback")?
        });
        Ok(row.map(Feedback::from))
    }

    /// Page through feedback joined with its summary; `filter` may use `f.` and `s.`
    async fn list_where(
        &self,
        filter: &str,
        args: &[Arg<'_>],
        params: &ListParams,
    ) -> Result<(Vec<Feedback>, i64)> {
        let count_sql = format!(
            "SELECT COUNT(*) FROM feedbacks f JOIN summaries s ON s.id = f.summary_id WHERE {}",
            filter
        );
        let list_sql = format!(
            "SELECT {} FROM feedbacks f JOIN summaries s ON s.id = f.summary_id \
             WHERE {} ORDER BY f.created_at DESC, f.id LIMIT ? OFFSET ?",
            FEEDBACK_COLUMNS, filter
        );

        let (rows, total) = with_pool!(self.pool, p => {
            let count = bind_args!(sqlx::query_as::<_, (i64,)>(&count_sql), args);
            let list = bind_args!(sqlx::query_as::<_, FeedbackRow>(&list_sql), args);
            let (total,) = count.fetch_one(p).await.context("Failed to count feedback")?;
            let rows = list
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to list feedback")?;
            (rows, total)
        });

        Ok((rows.into_iter().map(Feedback::from).collect(), total))
    }
}

#[async_trait]
impl FeedbackRepository for SqlxFeedbackRepository {
    async fn create(&self, feedback: &Feedback) -> Result<()> {
        with_pool!(self.pool, p => {
            sqlx::query(
                r#"
                INSERT INTO feedbacks (id, summary_id, comment, score, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&feedback.id)
            .bind(&feedback.summary_id)
            .bind(&feedback.comment)
            .bind(feedback.score)
            .bind(feedback.created_at)
            .bind(feedback.updated_at)
            .execute(p)
            .await
            .context("Failed to create feedback")?;
        });
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Feedback>> {
        self.find_one("id", id).await
    }

    async fn get_by_summary_id(&self, summary_id: &str) -> Result<Option<Feedback>> {
        self.find_one("summary_id", summary_id).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let affected = with_pool!(self.pool, p => {
            sqlx::query("DELETE FROM feedbacks WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete feedback")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list_by_curriculum(
        &self,
        curriculum_id: &str,
        owner_id: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<Feedback>, i64)> {
        match owner_id {
            Some(owner_id) => {
                self.list_where(
                    "s.curriculum_id = ? AND s.owner_id = ?",
                    &[Arg::Text(curriculum_id), Arg::Text(owner_id)],
                    params,
                )
                .await
            }
            None => {
                self.list_where("s.curriculum_id = ?", &[Arg::Text(curriculum_id)], params)
                    .await
            }
        }
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        min_score: Option<f64>,
        max_score: Option<f64>,
        params: &ListParams,
    ) -> Result<(Vec<Feedback>, i64)> {
        let mut filter = String::from("s.owner_id = ?");
        let mut args = vec![Arg::Text(owner_id)];
        if let Some(min) = min_score {
            filter.push_str(" AND f.score >= ?");
            args.push(Arg::Float(min));
        }
        if let Some(max) = max_score {
            filter.push_str(" AND f.score <= ?");
            args.push(Arg::Float(max));
        }
        self.list_where(&filter, &args, params).await
    }

    async fn list_all_by_owner(&self, owner_id: &str) -> Result<Vec<Feedback>> {
        let sql = format!(
            "SELECT {} FROM feedbacks f JOIN summaries s ON s.id = f.summary_id \
             WHERE s.owner_id = ? ORDER BY f.created_at, f.id",
            FEEDBACK_COLUMNS
        );
        let rows = with_pool!(self.pool, p => {
            sqlx::query_as::<_, FeedbackRow>(&sql)
                .bind(owner_id)
                .fetch_all(p)
                .await
                .context("Failed to load feedback")?
        });
        Ok(rows.into_iter().map(Feedback::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_curriculum, insert_user, setup_pool};
    use crate::db::repositories::{SqlxSummaryRepository, SummaryRepository};
    use crate::models::{Summary, SummaryContent, Visibility};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxFeedbackRepository) {
        let pool = setup_pool().await;
        let repo = SqlxFeedbackRepository::new(pool.clone());
        (pool, repo)
    }

    async fn insert_summary(pool: &DynDatabasePool, curriculum_id: &str, owner_id: &str) -> Summary {
        let summary = Summary::new(
            curriculum_id,
            1,
            owner_id,
            SummaryContent::parse(&"x".repeat(120)).unwrap(),
        );
        SqlxSummaryRepository::new(pool.clone())
            .create(&summary)
            .await
            .expect("Failed to insert summary");
        summary
    }

    #[tokio::test]
    async fn test_one_feedback_per_summary() {
        let (pool, repo) = setup_test_repo().await;
        let alice = insert_user(&pool, "alice").await;
        let c = insert_curriculum(&pool, &alice, "Rust basics", Visibility::Private, 1).await;
        let summary = insert_summary(&pool, &c.id, &alice.id).await;

        let feedback = Feedback::new(&summary.id, "Solid work", 8.5).unwrap();
        repo.create(&feedback).await.expect("Failed to create feedback");
        assert!(repo.create(&Feedback::new(&summary.id, "Again", 5.0).unwrap()).await.is_err());

        let found = repo.get_by_summary_id(&summary.id).await.unwrap().expect("feedback");
        assert_eq!(found.id, feedback.id);
        assert!((found.score - 8.5).abs() < f64::EPSILON);

        assert!(repo.delete(&feedback.id).await.unwrap());
        assert!(repo.get_by_id(&feedback.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleting_summary_cascades() {
        let (pool, repo) = setup_test_repo().await;
        let alice = insert_user(&pool, "alice").await;
        let c = insert_curriculum(&pool, &alice, "Rust basics", Visibility::Private, 1).await;
        let summary = insert_summary(&pool, &c.id, &alice.id).await;
        let feedback = Feedback::new(&summary.id, "Fine", 6.0).unwrap();
        repo.create(&feedback).await.unwrap();

        SqlxSummaryRepository::new(pool.clone()).delete(&summary.id).await.unwrap();
        assert!(repo.get_by_id(&feedback.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_owner_listing_with_score_range() {
        let (pool, repo) = setup_test_repo().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let c = insert_curriculum(&pool, &alice, "Rust basics", Visibility::Public, 1).await;

        for score in [3.0, 6.0, 9.0] {
            let s = insert_summary(&pool, &c.id, &alice.id).await;
            repo.create(&Feedback::new(&s.id, "ok", score).unwrap()).await.unwrap();
        }
        let s = insert_summary(&pool, &c.id, &bob.id).await;
        repo.create(&Feedback::new(&s.id, "ok", 7.0).unwrap()).await.unwrap();

        let params = ListParams::new(1, 10);
        let (_, total) = repo.list_by_owner(&alice.id, None, None, &params).await.unwrap();
        assert_eq!(total, 3);
        let (items, total) = repo
            .list_by_owner(&alice.id, Some(5.0), Some(9.0), &params)
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert!(items.iter().all(|f| f.score >= 5.0));

        let (_, total) = repo.list_by_curriculum(&c.id, None, &params).await.unwrap();
        assert_eq!(total, 4);
        let (_, total) = repo.list_by_curriculum(&c.id, Some(&bob.id), &params).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(repo.list_all_by_owner(&alice.id).await.unwrap().len(), 3);
    }
}
