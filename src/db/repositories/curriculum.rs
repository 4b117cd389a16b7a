//! Curriculum repository
//!
//! Curricula are stored in `curriculums` with one `week_schedules` row per
//! week. Lessons are kept as a JSON array in the week row.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::{placeholders, DynDatabasePool};
use crate::models::{Curriculum, ListParams, WeekSchedule};
use crate::with_pool;

/// Curriculum repository trait
#[async_trait]
pub trait CurriculumRepository: Send + Sync {
    /// Insert a curriculum together with its weeks
    async fn create(&self, curriculum: &Curriculum) -> Result<()>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Curriculum>>;

    /// Load several curricula; missing ids are skipped, order is not preserved
    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Curriculum>>;

    /// Persist title, visibility and updated_at and replace all weeks
    async fn update(&self, curriculum: &Curriculum) -> Result<()>;

    /// Delete a curriculum, releasing its tag usage first
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn count_by_owner(&self, owner_id: &str) -> Result<i64>;

    /// Curricula of one owner, newest first
    async fn list_by_owner(
        &self,
        owner_id: &str,
        params: &ListParams,
    ) -> Result<(Vec<Curriculum>, i64)>;

    /// All public curricula, most recently updated first
    async fn list_public(&self, params: &ListParams) -> Result<(Vec<Curriculum>, i64)>;

    /// Public curricula owned by users that `follower_id` follows
    async fn list_public_followed_by(
        &self,
        follower_id: &str,
        params: &ListParams,
    ) -> Result<(Vec<Curriculum>, i64)>;

    /// Every curriculum regardless of visibility, optionally for one owner
    async fn list_all(
        &self,
        owner_id: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<Curriculum>, i64)>;
}

#[derive(sqlx::FromRow)]
struct CurriculumRow {
    id: String,
    owner_id: String,
    title: String,
    visibility: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct WeekRow {
    curriculum_id: String,
    week_number: i64,
    title: String,
    lessons: String,
}

/// Attach week rows to their curricula, keeping the row order of `rows`.
fn assemble(rows: Vec<CurriculumRow>, weeks: Vec<WeekRow>) -> Result<Vec<Curriculum>> {
    let mut by_curriculum: HashMap<String, Vec<WeekSchedule>> = HashMap::new();
    for week in weeks {
        let lessons: Vec<String> = serde_json::from_str(&week.lessons)
            .with_context(|| format!("Corrupt lessons for week {}", week.week_number))?;
        by_curriculum
            .entry(week.curriculum_id)
            .or_default()
            .push(WeekSchedule {
                week_number: week.week_number,
                title: week.title,
                lessons,
            });
    }

    rows.into_iter()
        .map(|row| {
            let mut week_schedules = by_curriculum.remove(&row.id).unwrap_or_default();
            week_schedules.sort_by_key(|w| w.week_number);
            Ok(Curriculum {
                visibility: row.visibility.parse()?,
                id: row.id,
                owner_id: row.owner_id,
                title: row.title,
                week_schedules,
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
        })
        .collect()
}

fn lessons_json(week: &WeekSchedule) -> Result<String> {
    serde_json::to_string(&week.lessons).context("Failed to encode lessons")
}

/// SQLx-based curriculum repository implementation
pub struct SqlxCurriculumRepository {
    pool: DynDatabasePool,
}

impl SqlxCurriculumRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CurriculumRepository> {
        Arc::new(Self::new(pool))
    }

    async fn load_weeks(&self, ids: &[String]) -> Result<Vec<WeekRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT curriculum_id, week_number, title, lessons FROM week_schedules \
             WHERE curriculum_id IN ({}) ORDER BY curriculum_id, week_number",
            placeholders(ids.len())
        );
        let weeks = with_pool!(self.pool, p => {
            let mut query = sqlx::query_as::<_, WeekRow>(&sql);
            for id in ids {
                query = query.bind(id);
            }
            query.fetch_all(p).await.context("Failed to load weeks")?
        });
        Ok(weeks)
    }

    async fn hydrate(&self, rows: Vec<CurriculumRow>) -> Result<Vec<Curriculum>> {
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let weeks = self.load_weeks(&ids).await?;
        assemble(rows, weeks)
    }

    /// Page through curricula matching `filter`; every `?` in it binds one of `args`.
    async fn list_where(
        &self,
        filter: &str,
        args: &[&str],
        order_by: &str,
        params: &ListParams,
    ) -> Result<(Vec<Curriculum>, i64)> {
        let count_sql = format!("SELECT COUNT(*) FROM curriculums WHERE {}", filter);
        let list_sql = format!(
            "SELECT id, owner_id, title, visibility, created_at, updated_at FROM curriculums \
             WHERE {} ORDER BY {}, id LIMIT ? OFFSET ?",
            filter, order_by
        );

        let (rows, total) = with_pool!(self.pool, p => {
            let mut count = sqlx::query_as::<_, (i64,)>(&count_sql);
            for arg in args {
                count = count.bind(*arg);
            }
            let (total,) = count.fetch_one(p).await.context("Failed to count curricula")?;

            let mut list = sqlx::query_as::<_, CurriculumRow>(&list_sql);
            for arg in args {
                list = list.bind(*arg);
            }
            let rows = list
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to list curricula")?;
            (rows, total)
        });

        Ok((self.hydrate(rows).await?, total))
    }
}

#[async_trait]
impl CurriculumRepository for SqlxCurriculumRepository {
    async fn create(&self, curriculum: &Curriculum) -> Result<()> {
        let weeks = curriculum
            .week_schedules
            .iter()
            .map(|w| Ok((w, lessons_json(w)?)))
            .collect::<Result<Vec<_>>>()?;

        with_pool!(self.pool, p => {
            let mut tx = p.begin().await.context("Failed to begin transaction")?;
            sqlx::query(
                r#"
                INSERT INTO curriculums (id, owner_id, title, visibility, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&curriculum.id)
            .bind(&curriculum.owner_id)
            .bind(&curriculum.title)
            .bind(curriculum.visibility.to_string())
            .bind(curriculum.created_at)
            .bind(curriculum.updated_at)
            .execute(&mut *tx)
            .await
            .context("Failed to create curriculum")?;

            for (week, lessons) in &weeks {
                sqlx::query(
                    "INSERT INTO week_schedules (curriculum_id, week_number, title, lessons) VALUES (?, ?, ?, ?)",
                )
                .bind(&curriculum.id)
                .bind(week.week_number)
                .bind(&week.title)
                .bind(lessons)
                .execute(&mut *tx)
                .await
                .context("Failed to insert week")?;
            }
            tx.commit().await.context("Failed to commit curriculum")?;
        });
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Curriculum>> {
        let row = with_pool!(self.pool, p => {
            sqlx::query_as::<_, CurriculumRow>(
                "SELECT id, owner_id, title, visibility, created_at, updated_at FROM curriculums WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(p)
            .await
            .context("Failed to get curriculum")?
        });
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Curriculum>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, owner_id, title, visibility, created_at, updated_at FROM curriculums \
             WHERE id IN ({})",
            placeholders(ids.len())
        );
        let rows = with_pool!(self.pool, p => {
            let mut query = sqlx::query_as::<_, CurriculumRow>(&sql);
            for id in ids {
                query = query.bind(id);
            }
            query.fetch_all(p).await.context("Failed to get curricula by ids")?
        });
        self.hydrate(rows).await
    }

    async fn update(&self, curriculum: &Curriculum) -> Result<()> {
        let weeks = curriculum
            .week_schedules
            .iter()
            .map(|w| Ok((w, lessons_json(w)?)))
            .collect::<Result<Vec<_>>>()?;

        with_pool!(self.pool, p => {
            let mut tx = p.begin().await.context("Failed to begin transaction")?;
            sqlx::query("UPDATE curriculums SET title = ?, visibility = ?, updated_at = ? WHERE id = ?")
                .bind(&curriculum.title)
                .bind(curriculum.visibility.to_string())
                .bind(curriculum.updated_at)
                .bind(&curriculum.id)
                .execute(&mut *tx)
                .await
                .context("Failed to update curriculum")?;

            sqlx::query("DELETE FROM week_schedules WHERE curriculum_id = ?")
                .bind(&curriculum.id)
                .execute(&mut *tx)
                .await
                .context("Failed to clear weeks")?;

            for (week, lessons) in &weeks {
                sqlx::query(
                    "INSERT INTO week_schedules (curriculum_id, week_number, title, lessons) VALUES (?, ?, ?, ?)",
                )
                .bind(&curriculum.id)
                .bind(week.week_number)
                .bind(&week.title)
                .bind(lessons)
                .execute(&mut *tx)
                .await
                .context("Failed to insert week")?;
            }
            tx.commit().await.context("Failed to commit curriculum update")?;
        });
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let affected = with_pool!(self.pool, p => {
            let mut tx = p.begin().await.context("Failed to begin transaction")?;
            sqlx::query(
                r#"
                UPDATE tags SET usage_count = usage_count - 1
                WHERE id IN (SELECT tag_id FROM curriculum_tags WHERE curriculum_id = ?)
                  AND usage_count > 0
                "#,
            )
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to release tag usage")?;

            let affected = sqlx::query("DELETE FROM curriculums WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete curriculum")?
                .rows_affected();
            tx.commit().await.context("Failed to commit curriculum delete")?;
            affected
        });
        Ok(affected > 0)
    }

    async fn count_by_owner(&self, owner_id: &str) -> Result<i64> {
        let count = with_pool!(self.pool, p => {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM curriculums WHERE owner_id = ?")
                .bind(owner_id)
                .fetch_one(p)
                .await
                .context("Failed to count curricula")?;
            count
        });
        Ok(count)
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        params: &ListParams,
    ) -> Result<(Vec<Curriculum>, i64)> {
        self.list_where("owner_id = ?", &[owner_id], "created_at DESC", params)
            .await
    }

    async fn list_public(&self, params: &ListParams) -> Result<(Vec<Curriculum>, i64)> {
        self.list_where("visibility = 'PUBLIC'", &[], "updated_at DESC", params)
            .await
    }

    async fn list_public_followed_by(
        &self,
        follower_id: &str,
        params: &ListParams,
    ) -> Result<(Vec<Curriculum>, i64)> {
        self.list_where(
            "visibility = 'PUBLIC' AND owner_id IN \
             (SELECT followee_id FROM follows WHERE follower_id = ?)",
            &[follower_id],
            "updated_at DESC",
            params,
        )
        .await
    }

    async fn list_all(
        &self,
        owner_id: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<Curriculum>, i64)> {
        match owner_id {
            Some(owner_id) => {
                self.list_where("owner_id = ?", &[owner_id], "created_at DESC", params)
                    .await
            }
            None => self.list_where("1 = 1", &[], "created_at DESC", params).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{curriculum, insert_curriculum, insert_user, setup_pool};
    use crate::models::Visibility;
    use chrono::Duration;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxCurriculumRepository) {
        let pool = setup_pool().await;
        let repo = SqlxCurriculumRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_create_and_get_with_weeks() {
        let (pool, repo) = setup_test_repo().await;
        let owner = insert_user(&pool, "alice").await;
        let created = curriculum(&owner, "Rust in twelve weeks", Visibility::Private, 3);
        repo.create(&created).await.expect("Failed to create curriculum");

        let found = repo.get_by_id(&created.id).await.unwrap().expect("curriculum");
        assert_eq!(found.title, "Rust in twelve weeks");
        assert_eq!(found.visibility, Visibility::Private);
        assert_eq!(found.total_weeks(), 3);
        assert_eq!(found.week(2).unwrap().lessons, vec!["lesson 2-a", "lesson 2-b"]);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (_pool, repo) = setup_test_repo().await;
        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_weeks() {
        let (pool, repo) = setup_test_repo().await;
        let owner = insert_user(&pool, "alice").await;
        let mut c = insert_curriculum(&pool, &owner, "Original title", Visibility::Private, 3).await;

        c.title = "Renamed".to_string();
        c.visibility = Visibility::Public;
        assert!(c.remove_week_and_shift(1));
        c.touch();
        repo.update(&c).await.unwrap();

        let found = repo.get_by_id(&c.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Renamed");
        assert_eq!(found.visibility, Visibility::Public);
        let numbers: Vec<i64> = found.week_schedules.iter().map(|w| w.week_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(found.week(1).unwrap().lessons[0], "lesson 2-a");
    }

    #[tokio::test]
    async fn test_delete_cascades_weeks() {
        let (pool, repo) = setup_test_repo().await;
        let owner = insert_user(&pool, "alice").await;
        let c = insert_curriculum(&pool, &owner, "To be deleted", Visibility::Private, 2).await;

        assert!(repo.delete(&c.id).await.unwrap());
        assert!(!repo.delete(&c.id).await.unwrap());
        assert!(repo.load_weeks(&[c.id.clone()]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_by_visibility_and_owner() {
        let (pool, repo) = setup_test_repo().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        insert_curriculum(&pool, &alice, "Alice public", Visibility::Public, 1).await;
        insert_curriculum(&pool, &alice, "Alice private", Visibility::Private, 1).await;
        insert_curriculum(&pool, &bob, "Bob public", Visibility::Public, 2).await;

        assert_eq!(repo.count_by_owner(&alice.id).await.unwrap(), 2);

        let (mine, total) = repo.list_by_owner(&alice.id, &ListParams::new(1, 10)).await.unwrap();
        assert_eq!(total, 2);
        assert!(mine.iter().all(|c| c.owner_id == alice.id));

        let (public, total) = repo.list_public(&ListParams::new(1, 10)).await.unwrap();
        assert_eq!(total, 2);
        assert!(public.iter().all(|c| c.visibility == Visibility::Public));

        let (all, total) = repo.list_all(None, &ListParams::new(1, 2)).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(all.len(), 2);

        let (bobs, _) = repo.list_all(Some(&bob.id), &ListParams::new(1, 10)).await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].total_weeks(), 2);
    }

    #[tokio::test]
    async fn test_public_ordered_by_update_time() {
        let (pool, repo) = setup_test_repo().await;
        let alice = insert_user(&pool, "alice").await;
        let mut older = curriculum(&alice, "Older", Visibility::Public, 1);
        older.updated_at = Utc::now() - Duration::hours(1);
        repo.create(&older).await.unwrap();
        let newer = insert_curriculum(&pool, &alice, "Newer", Visibility::Public, 1).await;

        let (items, _) = repo.list_public(&ListParams::new(1, 10)).await.unwrap();
        assert_eq!(items[0].id, newer.id);
        assert_eq!(items[1].id, older.id);
    }

    #[tokio::test]
    async fn test_followed_public_curricula() {
        let (pool, repo) = setup_test_repo().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let carol = insert_user(&pool, "carol").await;
        insert_curriculum(&pool, &bob, "Bob public", Visibility::Public, 1).await;
        insert_curriculum(&pool, &bob, "Bob private", Visibility::Private, 1).await;
        insert_curriculum(&pool, &carol, "Carol public", Visibility::Public, 1).await;

        with_follow(&pool, &alice.id, &bob.id).await;

        let (items, total) = repo
            .list_public_followed_by(&alice.id, &ListParams::new(1, 10))
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].title, "Bob public");
    }

    async fn with_follow(pool: &DynDatabasePool, follower: &str, followee: &str) {
        use crate::db::repositories::FollowRepository;
        let follow = crate::models::Follow::new(follower, followee).unwrap();
        crate::db::repositories::SqlxFollowRepository::new(pool.clone())
            .create(&follow)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_by_ids() {
        let (pool, repo) = setup_test_repo().await;
        let alice = insert_user(&pool, "alice").await;
        let a = insert_curriculum(&pool, &alice, "First", Visibility::Public, 1).await;
        let b = insert_curriculum(&pool, &alice, "Second", Visibility::Public, 1).await;

        let found = repo.get_by_ids(&[a.id.clone(), b.id.clone(), "missing".into()]).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(repo.get_by_ids(&[]).await.unwrap().is_empty());
    }
}
