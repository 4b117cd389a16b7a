//! Follow repository
//!
//! The social graph: one `follows` row per directed edge.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::db::{placeholders, DynDatabasePool};
use crate::models::{Follow, ListParams};
use crate::with_pool;

/// A user on one side of a follow edge, with their graph counts
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FollowUser {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub followers_count: i64,
    pub followees_count: i64,
    pub followed_at: DateTime<Utc>,
}

/// A follow suggestion with the number of the caller's followees who follow it
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SuggestedUser {
    pub user_id: String,
    #[serde(rename = "username")]
    pub name: String,
    pub mutual_count: i64,
}

/// Follow repository trait
#[async_trait]
pub trait FollowRepository: Send + Sync {
    async fn create(&self, follow: &Follow) -> Result<()>;

    /// Remove an edge; false when it did not exist
    async fn delete(&self, follower_id: &str, followee_id: &str) -> Result<bool>;

    async fn exists(&self, follower_id: &str, followee_id: &str) -> Result<bool>;

    /// Users following `user_id`, most recent first
    async fn list_followers(
        &self,
        user_id: &str,
        params: &ListParams,
    ) -> Result<(Vec<FollowUser>, i64)>;

    /// Users `user_id` follows, most recent first
    async fn list_following(
        &self,
        user_id: &str,
        params: &ListParams,
    ) -> Result<(Vec<FollowUser>, i64)>;

    async fn count_followers(&self, user_id: &str) -> Result<i64>;

    async fn count_following(&self, user_id: &str) -> Result<i64>;

    /// The subset of `candidates` that `user_id` follows
    async fn following_among(&self, user_id: &str, candidates: &[String]) -> Result<HashSet<String>>;

    /// The subset of `candidates` that follow `user_id`
    async fn followers_among(&self, user_id: &str, candidates: &[String]) -> Result<HashSet<String>>;

    /// Friends of friends not yet followed, by mutual count
    async fn suggestions(&self, user_id: &str, limit: i64) -> Result<Vec<SuggestedUser>>;
}

/// SQLx-based follow repository implementation
pub struct SqlxFollowRepository {
    pool: DynDatabasePool,
}

impl SqlxFollowRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FollowRepository> {
        Arc::new(Self::new(pool))
    }

    /// `anchor` is the column matched against `user_id`, `other` the side returned.
    async fn list_side(
        &self,
        anchor: &'static str,
        other: &'static str,
        user_id: &str,
        params: &ListParams,
    ) -> Result<(Vec<FollowUser>, i64)> {
        let count_sql = format!("SELECT COUNT(*) FROM follows WHERE {} = ?", anchor);
        let list_sql = format!(
            r#"
            SELECT u.id AS user_id, u.name, u.email,
                   (SELECT COUNT(*) FROM follows x WHERE x.followee_id = u.id) AS followers_count,
                   (SELECT COUNT(*) FROM follows y WHERE y.follower_id = u.id) AS followees_count,
                   f.created_at AS followed_at
            FROM follows f
            JOIN users u ON u.id = f.{other}
            WHERE f.{anchor} = ?
            ORDER BY f.created_at DESC, u.id
            LIMIT ? OFFSET ?
            "#,
            other = other,
            anchor = anchor
        );

        let result = with_pool!(self.pool, p => {
            let (total,): (i64,) = sqlx::query_as(&count_sql)
                .bind(user_id)
                .fetch_one(p)
                .await
                .context("Failed to count follows")?;
            let users = sqlx::query_as::<_, FollowUser>(&list_sql)
                .bind(user_id)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to list follows")?;
            (users, total)
        });
        Ok(result)
    }

    async fn count_by(&self, column: &'static str, user_id: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM follows WHERE {} = ?", column);
        let count = with_pool!(self.pool, p => {
            let (count,): (i64,) = sqlx::query_as(&sql)
                .bind(user_id)
                .fetch_one(p)
                .await
                .context("Failed to count follows")?;
            count
        });
        Ok(count)
    }

    async fn edges_among(
        &self,
        anchor: &'static str,
        other: &'static str,
        user_id: &str,
        candidates: &[String],
    ) -> Result<HashSet<String>> {
        if candidates.is_empty() {
            return Ok(HashSet::new());
        }
        let sql = format!(
            "SELECT {other} FROM follows WHERE {anchor} = ? AND {other} IN ({list})",
            other = other,
            anchor = anchor,
            list = placeholders(candidates.len())
        );
        let rows: Vec<(String,)> = with_pool!(self.pool, p => {
            let mut query = sqlx::query_as::<_, (String,)>(&sql).bind(user_id);
            for id in candidates {
                query = query.bind(id);
            }
            query.fetch_all(p).await.context("Failed to look up follows")?
        });
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[async_trait]
impl FollowRepository for SqlxFollowRepository {
    async fn create(&self, follow: &Follow) -> Result<()> {
        with_pool!(self.pool, p => {
            sqlx::query(
                "INSERT INTO follows (id, follower_id, followee_id, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&follow.id)
            .bind(&follow.follower_id)
            .bind(&follow.followee_id)
            .bind(follow.created_at)
            .execute(p)
            .await
            .context("Failed to create follow")?;
        });
        Ok(())
    }

    async fn delete(&self, follower_id: &str, followee_id: &str) -> Result<bool> {
        let affected = with_pool!(self.pool, p => {
            sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followee_id = ?")
                .bind(follower_id)
                .bind(followee_id)
                .execute(p)
                .await
                .context("Failed to delete follow")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn exists(&self, follower_id: &str, followee_id: &str) -> Result<bool> {
        let count = with_pool!(self.pool, p => {
            let (count,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM follows WHERE follower_id = ? AND followee_id = ?",
            )
            .bind(follower_id)
            .bind(followee_id)
            .fetch_one(p)
            .await
            .context("Failed to check follow")?;
            count
        });
        Ok(count > 0)
    }

    async fn list_followers(
        &self,
        user_id: &str,
        params: &ListParams,
    ) -> Result<(Vec<FollowUser>, i64)> {
        self.list_side("followee_id", "follower_id", user_id, params).await
    }

    async fn list_following(
        &self,
        user_id: &str,
        params: &ListParams,
    ) -> Result<(Vec<FollowUser>, i64)> {
        self.list_side("follower_id", "followee_id", user_id, params).await
    }

    async fn count_followers(&self, user_id: &str) -> Result<i64> {
        self.count_by("followee_id", user_id).await
    }

    async fn count_following(&self, user_id: &str) -> Result<i64> {
        self.count_by("follower_id", user_id).await
    }

    async fn following_among(&self, user_id: &str, candidates: &[String]) -> Result<HashSet<String>> {
        self.edges_among("follower_id", "followee_id", user_id, candidates).await
    }

    async fn followers_among(&self, user_id: &str, candidates: &[String]) -> Result<HashSet<String>> {
        self.edges_among("followee_id", "follower_id", user_id, candidates).await
    }

    async fn suggestions(&self, user_id: &str, limit: i64) -> Result<Vec<SuggestedUser>> {
        let suggestions = with_pool!(self.pool, p => {
            sqlx::query_as::<_, SuggestedUser>(
                r#"
                SELECT u.id AS user_id, u.name, COUNT(*) AS mutual_count
                FROM follows mine
                JOIN follows theirs ON theirs.follower_id = mine.followee_id
                JOIN users u ON u.id = theirs.followee_id
                WHERE mine.follower_id = ?
                  AND theirs.followee_id <> ?
                  AND theirs.followee_id NOT IN
                      (SELECT followee_id FROM follows WHERE follower_id = ?)
                GROUP BY u.id, u.name
                ORDER BY mutual_count DESC, u.name
                LIMIT ?
                "#,
            )
            .bind(user_id)
            .bind(user_id)
            .bind(user_id)
            .bind(limit)
            .fetch_all(p)
            .await
            .context("Failed to load follow suggestions")?
        });
        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxFollowRepository) {
        let pool = setup_pool().await;
        let repo = SqlxFollowRepository::new(pool.clone());
        (pool, repo)
    }

    async fn follow(repo: &SqlxFollowRepository, from: &str, to: &str) {
        repo.create(&Follow::new(from, to).unwrap())
            .await
            .expect("Failed to follow");
    }

    #[tokio::test]
    async fn test_follow_and_unfollow() {
        let (pool, repo) = setup_test_repo().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;

        follow(&repo, &alice.id, &bob.id).await;
        assert!(repo.exists(&alice.id, &bob.id).await.unwrap());
        assert!(!repo.exists(&bob.id, &alice.id).await.unwrap());
        assert!(repo.create(&Follow::new(&alice.id, &bob.id).unwrap()).await.is_err());

        assert!(repo.delete(&alice.id, &bob.id).await.unwrap());
        assert!(!repo.delete(&alice.id, &bob.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_lists_and_counts() {
        let (pool, repo) = setup_test_repo().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let carol = insert_user(&pool, "carol").await;

        follow(&repo, &bob.id, &alice.id).await;
        follow(&repo, &carol.id, &alice.id).await;
        follow(&repo, &alice.id, &bob.id).await;

        assert_eq!(repo.count_followers(&alice.id).await.unwrap(), 2);
        assert_eq!(repo.count_following(&alice.id).await.unwrap(), 1);

        let (followers, total) = repo
            .list_followers(&alice.id, &ListParams::new(1, 10))
            .await
            .unwrap();
        assert_eq!(total, 2);
        let bob_entry = followers.iter().find(|u| u.user_id == bob.id).expect("bob follows");
        assert_eq!(bob_entry.followers_count, 1);
        assert_eq!(bob_entry.followees_count, 1);

        let (following, _) = repo
            .list_following(&alice.id, &ListParams::new(1, 10))
            .await
            .unwrap();
        assert_eq!(following[0].name, "bob");
    }

    #[tokio::test]
    async fn test_edges_among() {
        let (pool, repo) = setup_test_repo().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let carol = insert_user(&pool, "carol").await;
        follow(&repo, &alice.id, &bob.id).await;
        follow(&repo, &carol.id, &alice.id).await;

        let candidates = vec![bob.id.clone(), carol.id.clone()];
        let following = repo.following_among(&alice.id, &candidates).await.unwrap();
        assert!(following.contains(&bob.id));
        assert!(!following.contains(&carol.id));

        let followers = repo.followers_among(&alice.id, &candidates).await.unwrap();
        assert!(followers.contains(&carol.id));
        assert!(!followers.contains(&bob.id));
    }

    #[tokio::test]
    async fn test_suggestions_rank_by_mutual_count() {
        let (pool, repo) = setup_test_repo().await;
        let me = insert_user(&pool, "me").await;
        let f1 = insert_user(&pool, "friend one").await;
        let f2 = insert_user(&pool, "friend two").await;
        let popular = insert_user(&pool, "popular").await;
        let niche = insert_user(&pool, "niche").await;

        follow(&repo, &me.id, &f1.id).await;
        follow(&repo, &me.id, &f2.id).await;
        follow(&repo, &f1.id, &popular.id).await;
        follow(&repo, &f2.id, &popular.id).await;
        follow(&repo, &f2.id, &niche.id).await;
        follow(&repo, &f1.id, &me.id).await;
        follow(&repo, &f1.id, &f2.id).await;

        let suggestions = repo.suggestions(&me.id, 10).await.unwrap();
        let names: Vec<&str> = suggestions.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["popular", "niche"]);
        assert_eq!(suggestions[0].mutual_count, 2);
    }
}
