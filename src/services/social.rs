//! Social graph service
//!
//! Follow and unfollow, follower/followee listings annotated relative to the
//! viewer, and friend-of-friend suggestions.

use crate::db::repositories::{FollowRepository, FollowUser, SuggestedUser, UserRepository};
use crate::metrics::{self, Event};
use crate::models::{Follow, ListParams, PagedResult, User};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

pub const DEFAULT_SUGGESTIONS: i64 = 10;
pub const MAX_SUGGESTIONS: i64 = 20;

#[derive(Debug, thiserror::Error)]
pub enum SocialServiceError {
    #[error("You cannot follow yourself")]
    SelfFollow,

    #[error("User not found")]
    UserNotFound,

    #[error("Already following this user")]
    AlreadyFollowing,

    #[error("Not following this user")]
    NotFollowing,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A user in a follower or followee list
#[derive(Debug, Clone, Serialize)]
pub struct FollowEntry {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub followers_count: i64,
    pub followees_count: i64,
    /// The viewer follows this user
    pub is_following: bool,
    /// This user follows the viewer
    pub is_followed_by: bool,
    pub followed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FollowStats {
    pub user_id: String,
    pub followers_count: i64,
    pub followees_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FollowStatus {
    pub is_following: bool,
    pub is_followed_by: bool,
    pub is_mutual: bool,
}

pub struct SocialService {
    follow_repo: Arc<dyn FollowRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl SocialService {
    pub fn new(follow_repo: Arc<dyn FollowRepository>, user_repo: Arc<dyn UserRepository>) -> Self {
        Self {
            follow_repo,
            user_repo,
        }
    }

    async fn ensure_user(&self, user_id: &str) -> Result<(), SocialServiceError> {
        match self.user_repo.get_by_id(user_id).await? {
            Some(_) => Ok(()),
            None => Err(SocialServiceError::UserNotFound),
        }
    }

    pub async fn follow(&self, follower: &User, followee_id: &str) -> Result<Follow, SocialServiceError> {
        let follow = Follow::new(&follower.id, followee_id).map_err(|_| SocialServiceError::SelfFollow)?;
        self.ensure_user(followee_id).await?;
        if self.follow_repo.exists(&follower.id, followee_id).await? {
            return Err(SocialServiceError::AlreadyFollowing);
        }

        self.follow_repo.create(&follow).await?;
        tracing::info!(follower_id = %follower.id, followee_id = %followee_id, "User followed");
        metrics::record(Event::FollowCreation);
        Ok(follow)
    }

    pub async fn unfollow(&self, follower: &User, followee_id: &str) -> Result<(), SocialServiceError> {
        if !self.follow_repo.delete(&follower.id, followee_id).await? {
            return Err(SocialServiceError::NotFollowing);
        }
        tracing::info!(follower_id = %follower.id, followee_id = %followee_id, "User unfollowed");
        Ok(())
    }

    async fn annotate(
        &self,
        viewer: &User,
        users: Vec<FollowUser>,
    ) -> Result<Vec<FollowEntry>, SocialServiceError> {
        let ids: Vec<String> = users.iter().map(|u| u.user_id.clone()).collect();
        let following = self.follow_repo.following_among(&viewer.id, &ids).await?;
        let followers = self.follow_repo.followers_among(&viewer.id, &ids).await?;

        Ok(users
            .into_iter()
            .map(|u| FollowEntry {
                is_following: following.contains(&u.user_id),
                is_followed_by: followers.contains(&u.user_id),
                user_id: u.user_id,
                username: u.name,
                email: u.email,
                followers_count: u.followers_count,
                followees_count: u.followees_count,
                followed_at: u.followed_at,
            })
            .collect())
    }

    pub async fn followers(
        &self,
        viewer: &User,
        user_id: &str,
        params: &ListParams,
    ) -> Result<PagedResult<FollowEntry>, SocialServiceError> {
        self.ensure_user(user_id).await?;
        let (users, total) = self.follow_repo.list_followers(user_id, params).await?;
        let entries = self.annotate(viewer, users).await?;
        Ok(PagedResult::new(entries, total, params))
    }

    pub async fn following(
        &self,
        viewer: &User,
        user_id: &str,
        params: &ListParams,
    ) -> Result<PagedResult<FollowEntry>, SocialServiceError> {
        self.ensure_user(user_id).await?;
        let (users, total) = self.follow_repo.list_following(user_id, params).await?;
        let entries = self.annotate(viewer, users).await?;
        Ok(PagedResult::new(entries, total, params))
    }

    pub async fn stats(&self, user_id: &str) -> Result<FollowStats, SocialServiceError> {
        self.ensure_user(user_id).await?;
        Ok(FollowStats {
            user_id: user_id.to_string(),
            followers_count: self.follow_repo.count_followers(user_id).await?,
            followees_count: self.follow_repo.count_following(user_id).await?,
        })
    }

    /// Relationship between the viewer and `user_id`
    pub async fn status(&self, viewer: &User, user_id: &str) -> Result<FollowStatus, SocialServiceError> {
        self.ensure_user(user_id).await?;
        let is_following = self.follow_repo.exists(&viewer.id, user_id).await?;
        let is_followed_by = self.follow_repo.exists(user_id, &viewer.id).await?;
        Ok(FollowStatus {
            is_following,
            is_followed_by,
            is_mutual: is_following && is_followed_by,
        })
    }

    pub async fn suggestions(&self, viewer: &User, limit: i64) -> Result<Vec<SuggestedUser>, SocialServiceError> {
        if !(1..=MAX_SUGGESTIONS).contains(&limit) {
            return Err(SocialServiceError::ValidationError(format!(
                "limit must be between 1 and {}",
                MAX_SUGGESTIONS
            )));
        }
        Ok(self.follow_repo.suggestions(&viewer.id, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use crate::db::repositories::{SqlxFollowRepository, SqlxUserRepository};

    async fn setup_test_service() -> (SocialService, User, User, User) {
        let pool = setup_pool().await;
        let service = SocialService::new(
            SqlxFollowRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
        );
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let carol = insert_user(&pool, "carol").await;
        (service, alice, bob, carol)
    }

    #[tokio::test]
    async fn test_follow_rules() {
        let (service, alice, bob, _) = setup_test_service().await;

        assert!(matches!(
            service.follow(&alice, &alice.id).await,
            Err(SocialServiceError::SelfFollow)
        ));
        assert!(matches!(
            service.follow(&alice, "ghost").await,
            Err(SocialServiceError::UserNotFound)
        ));
        service.follow(&alice, &bob.id).await.unwrap();
        assert!(matches!(
            service.follow(&alice, &bob.id).await,
            Err(SocialServiceError::AlreadyFollowing)
        ));

        service.unfollow(&alice, &bob.id).await.unwrap();
        assert!(matches!(
            service.unfollow(&alice, &bob.id).await,
            Err(SocialServiceError::NotFollowing)
        ));
    }

    #[tokio::test]
    async fn test_listings_are_annotated_for_viewer() {
        let (service, alice, bob, carol) = setup_test_service().await;
        service.follow(&bob, &alice.id).await.unwrap();
        service.follow(&carol, &alice.id).await.unwrap();
        service.follow(&alice, &bob.id).await.unwrap();

        let page = service.followers(&alice, &alice.id, &ListParams::new(1, 10)).await.unwrap();
        assert_eq!(page.total, 2);
        let bob_entry = page.items.iter().find(|e| e.user_id == bob.id).unwrap();
        assert!(bob_entry.is_following && bob_entry.is_followed_by);
        let carol_entry = page.items.iter().find(|e| e.user_id == carol.id).unwrap();
        assert!(!carol_entry.is_following && carol_entry.is_followed_by);

        let page = service.following(&carol, &alice.id, &ListParams::new(1, 10)).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].username, "bob");
    }

    #[tokio::test]
    async fn test_stats_and_status() {
        let (service, alice, bob, _) = setup_test_service().await;
        service.follow(&alice, &bob.id).await.unwrap();
        service.follow(&bob, &alice.id).await.unwrap();

        let stats = service.stats(&bob.id).await.unwrap();
        assert_eq!((stats.followers_count, stats.followees_count), (1, 1));

        let status = service.status(&alice, &bob.id).await.unwrap();
        assert!(status.is_mutual);
        assert!(matches!(service.stats("ghost").await, Err(SocialServiceError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_suggestions() {
        let (service, alice, bob, carol) = setup_test_service().await;
        service.follow(&alice, &bob.id).await.unwrap();
        service.follow(&bob, &carol.id).await.unwrap();
        service.follow(&bob, &alice.id).await.unwrap();

        let suggestions = service.suggestions(&alice, DEFAULT_SUGGESTIONS).await.unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].user_id, carol.id);
        assert_eq!(suggestions[0].mutual_count, 1);

        assert!(matches!(
            service.suggestions(&alice, 21).await,
            Err(SocialServiceError::ValidationError(_))
        ));
    }
}
