//! Engagement service
//!
//! Likes, bookmarks and comments on curricula. All of them require view
//! access to the curriculum; a private curriculum of another user is reported
//! as not accessible rather than missing.

use crate::db::repositories::{
    BookmarkRepository, CommentRepository, CurriculumRepository, LikeRepository,
};
use crate::metrics::{self, Event};
use crate::models::{
    Bookmark, Comment, CommentContent, Curriculum, Like, ListParams, PagedResult, User,
    ValidationError,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum EngagementServiceError {
    #[error("Curriculum not found")]
    CurriculumNotFound,

    #[error("You do not have access to this curriculum")]
    CurriculumNotAccessible,

    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("You do not have permission to modify this comment")]
    PermissionDenied,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ValidationError> for EngagementServiceError {
    fn from(e: ValidationError) -> Self {
        EngagementServiceError::ValidationError(e.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LikeStatus {
    pub curriculum_id: String,
    pub is_liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookmarkStatus {
    pub curriculum_id: String,
    pub is_bookmarked: bool,
    pub bookmark_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurriculumSocialStats {
    pub curriculum_id: String,
    pub like_count: i64,
    pub comment_count: i64,
    pub bookmark_count: i64,
    pub is_liked_by_user: bool,
    pub is_bookmarked_by_user: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSocialStats {
    pub user_id: String,
    pub likes_given: i64,
    pub comments_written: i64,
    pub bookmarks_made: i64,
    pub likes_received: i64,
    pub comments_received: i64,
}

pub struct EngagementService {
    curriculum_repo: Arc<dyn CurriculumRepository>,
    like_repo: Arc<dyn LikeRepository>,
    bookmark_repo: Arc<dyn BookmarkRepository>,
    comment_repo: Arc<dyn CommentRepository>,
}

impl EngagementService {
    pub fn new(
        curriculum_repo: Arc<dyn CurriculumRepository>,
        like_repo: Arc<dyn LikeRepository>,
        bookmark_repo: Arc<dyn BookmarkRepository>,
        comment_repo: Arc<dyn CommentRepository>,
    ) -> Self {
        Self {
            curriculum_repo,
            like_repo,
            bookmark_repo,
            comment_repo,
        }
    }

    async fn accessible(&self, user: &User, curriculum_id: &str) -> Result<Curriculum, EngagementServiceError> {
        let curriculum = self
            .curriculum_repo
            .get_by_id(curriculum_id)
            .await?
            .ok_or(EngagementServiceError::CurriculumNotFound)?;
        if !curriculum.can_view(&user.id, user.is_admin()) {
            return Err(EngagementServiceError::CurriculumNotAccessible);
        }
        Ok(curriculum)
    }

    // Likes

    pub async fn like(&self, user: &User, curriculum_id: &str) -> Result<Like, EngagementServiceError> {
        let curriculum = self.accessible(user, curriculum_id).await?;
        if self.like_repo.exists(&curriculum.id, &user.id).await? {
            return Err(EngagementServiceError::AlreadyExists("Like"));
        }
        let like = Like::new(&curriculum.id, &user.id);
        self.like_repo.create(&like).await?;
        tracing::info!(curriculum_id = %curriculum.id, user_id = %user.id, "Curriculum liked");
        metrics::record(Event::LikeCreation);
        Ok(like)
    }

    pub async fn unlike(&self, user: &User, curriculum_id: &str) -> Result<(), EngagementServiceError> {
        let curriculum = self.accessible(user, curriculum_id).await?;
        if !self.like_repo.delete(&curriculum.id, &user.id).await? {
            return Err(EngagementServiceError::NotFound("Like"));
        }
        Ok(())
    }

    pub async fn list_likes(
        &self,
        user: &User,
        curriculum_id: &str,
        params: &ListParams,
    ) -> Result<PagedResult<Like>, EngagementServiceError> {
        let curriculum = self.accessible(user, curriculum_id).await?;
        let (items, total) = self.like_repo.list_by_curriculum(&curriculum.id, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn like_status(&self, user: &User, curriculum_id: &str) -> Result<LikeStatus, EngagementServiceError> {
        let curriculum = self.accessible(user, curriculum_id).await?;
        Ok(LikeStatus {
            is_liked: self.like_repo.exists(&curriculum.id, &user.id).await?,
            like_count: self.like_repo.count_by_curriculum(&curriculum.id).await?,
            curriculum_id: curriculum.id,
        })
    }

    pub async fn my_likes(&self, user: &User, params: &ListParams) -> Result<PagedResult<Like>, EngagementServiceError> {
        let (items, total) = self.like_repo.list_by_user(&user.id, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    // Bookmarks

    pub async fn bookmark(&self, user: &User, curriculum_id: &str) -> Result<Bookmark, EngagementServiceError> {
        let curriculum = self.accessible(user, curriculum_id).await?;
        if self.bookmark_repo.exists(&curriculum.id, &user.id).await? {
            return Err(EngagementServiceError::AlreadyExists("Bookmark"));
        }
        let bookmark = Bookmark::new(&curriculum.id, &user.id);
        self.bookmark_repo.create(&bookmark).await?;
        tracing::info!(curriculum_id = %curriculum.id, user_id = %user.id, "Curriculum bookmarked");
        metrics::record(Event::BookmarkCreation);
        Ok(bookmark)
    }

    pub async fn unbookmark(&self, user: &User, curriculum_id: &str) -> Result<(), EngagementServiceError> {
        let curriculum = self.accessible(user, curriculum_id).await?;
        if !self.bookmark_repo.delete(&curriculum.id, &user.id).await? {
            return Err(EngagementServiceError::NotFound("Bookmark"));
        }
        Ok(())
    }

    pub async fn bookmark_status(
        &self,
        user: &User,
        curriculum_id: &str,
    ) -> Result<BookmarkStatus, EngagementServiceError> {
        let curriculum = self.accessible(user, curriculum_id).await?;
        Ok(BookmarkStatus {
            is_bookmarked: self.bookmark_repo.exists(&curriculum.id, &user.id).await?,
            bookmark_count: self.bookmark_repo.count_by_curriculum(&curriculum.id).await?,
            curriculum_id: curriculum.id,
        })
    }

    pub async fn my_bookmarks(
        &self,
        user: &User,
        params: &ListParams,
    ) -> Result<PagedResult<Bookmark>, EngagementServiceError> {
        let (items, total) = self.bookmark_repo.list_by_user(&user.id, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    // Comments

    pub async fn add_comment(
        &self,
        user: &User,
        curriculum_id: &str,
        content: &str,
    ) -> Result<Comment, EngagementServiceError> {
        let curriculum = self.accessible(user, curriculum_id).await?;
        let content = CommentContent::parse(content)?;
        let comment = Comment::new(&curriculum.id, &user.id, &user.name, content);
        self.comment_repo.create(&comment).await?;
        tracing::info!(comment_id = %comment.id, curriculum_id = %curriculum.id, "Comment added");
        metrics::record(Event::CommentCreation);
        Ok(comment)
    }

    pub async fn list_comments(
        &self,
        user: &User,
        curriculum_id: &str,
        params: &ListParams,
    ) -> Result<PagedResult<Comment>, EngagementServiceError> {
        let curriculum = self.accessible(user, curriculum_id).await?;
        let (items, total) = self.comment_repo.list_by_curriculum(&curriculum.id, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    async fn load_comment(&self, id: &str) -> Result<Comment, EngagementServiceError> {
        self.comment_repo
            .get_by_id(id)
            .await?
            .ok_or(EngagementServiceError::NotFound("Comment"))
    }

    pub async fn get_comment(&self, user: &User, id: &str) -> Result<Comment, EngagementServiceError> {
        let comment = self.load_comment(id).await?;
        self.accessible(user, &comment.curriculum_id).await?;
        Ok(comment)
    }

    pub async fn update_comment(
        &self,
        user: &User,
        id: &str,
        content: &str,
    ) -> Result<Comment, EngagementServiceError> {
        let mut comment = self.load_comment(id).await?;
        if !comment.can_modify(&user.id, user.is_admin()) {
            return Err(EngagementServiceError::PermissionDenied);
        }
        comment.content = CommentContent::parse(content)?.into_inner();
        comment.updated_at = Utc::now();
        self.comment_repo.update(&comment).await?;
        Ok(comment)
    }

    pub async fn delete_comment(&self, user: &User, id: &str) -> Result<(), EngagementServiceError> {
        let comment = self.load_comment(id).await?;
        if !comment.can_modify(&user.id, user.is_admin()) {
            return Err(EngagementServiceError::PermissionDenied);
        }
        self.comment_repo.delete(&comment.id).await?;
        tracing::info!(comment_id = %comment.id, "Comment deleted");
        Ok(())
    }

    pub async fn my_comments(
        &self,
        user: &User,
        params: &ListParams,
    ) -> Result<PagedResult<Comment>, EngagementServiceError> {
        let (items, total) = self.comment_repo.list_by_user(&user.id, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    // Aggregates

    pub async fn curriculum_stats(
        &self,
        user: &User,
        curriculum_id: &str,
    ) -> Result<CurriculumSocialStats, EngagementServiceError> {
        let curriculum = self.accessible(user, curriculum_id).await?;
        let id = curriculum.id.as_str();
        let (like_count, comment_count, bookmark_count, is_liked_by_user, is_bookmarked_by_user) =
            futures::try_join!(
                self.like_repo.count_by_curriculum(id),
                self.comment_repo.count_by_curriculum(id),
                self.bookmark_repo.count_by_curriculum(id),
                self.like_repo.exists(id, &user.id),
                self.bookmark_repo.exists(id, &user.id),
            )?;
        Ok(CurriculumSocialStats {
            curriculum_id: id.to_string(),
            like_count,
            comment_count,
            bookmark_count,
            is_liked_by_user,
            is_bookmarked_by_user,
        })
    }

    pub async fn user_stats(&self, user: &User) -> Result<UserSocialStats, EngagementServiceError> {
        let id = user.id.as_str();
        let (likes_given, comments_written, bookmarks_made, likes_received, comments_received) =
            futures::try_join!(
                self.like_repo.count_by_user(id),
                self.comment_repo.count_by_user(id),
                self.bookmark_repo.count_by_user(id),
                self.like_repo.count_received(id),
                self.comment_repo.count_received(id),
            )?;
        Ok(UserSocialStats {
            user_id: user.id.clone(),
            likes_given,
            comments_written,
            bookmarks_made,
            likes_received,
            comments_received,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_admin, insert_curriculum, insert_user, setup_pool};
    use crate::db::repositories::{
        SqlxBookmarkRepository, SqlxCommentRepository, SqlxCurriculumRepository, SqlxLikeRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::models::Visibility;

    fn service(pool: &DynDatabasePool) -> EngagementService {
        EngagementService::new(
            SqlxCurriculumRepository::boxed(pool.clone()),
            SqlxLikeRepository::boxed(pool.clone()),
            SqlxBookmarkRepository::boxed(pool.clone()),
            SqlxCommentRepository::boxed(pool.clone()),
        )
    }

    #[tokio::test]
    async fn test_like_rules_and_status() {
        let pool = setup_pool().await;
        let svc = service(&pool);
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let public = insert_curriculum(&pool, &alice, "Open plan", Visibility::Public, 1).await;
        let private = insert_curriculum(&pool, &alice, "Hidden plan", Visibility::Private, 1).await;

        assert!(matches!(
            svc.like(&bob, &private.id).await,
            Err(EngagementServiceError::CurriculumNotAccessible)
        ));
        assert!(matches!(
            svc.like(&bob, "missing").await,
            Err(EngagementServiceError::CurriculumNotFound)
        ));

        svc.like(&bob, &public.id).await.unwrap();
        assert!(matches!(
            svc.like(&bob, &public.id).await,
            Err(EngagementServiceError::AlreadyExists(_))
        ));
        let status = svc.like_status(&bob, &public.id).await.unwrap();
        assert!(status.is_liked);
        assert_eq!(status.like_count, 1);
        assert_eq!(svc.list_likes(&alice, &public.id, &ListParams::default()).await.unwrap().total, 1);
        assert_eq!(svc.my_likes(&bob, &ListParams::default()).await.unwrap().total, 1);

        svc.unlike(&bob, &public.id).await.unwrap();
        assert!(matches!(
            svc.unlike(&bob, &public.id).await,
            Err(EngagementServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_bookmarks() {
        let pool = setup_pool().await;
        let svc = service(&pool);
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let c = insert_curriculum(&pool, &alice, "Open plan", Visibility::Public, 1).await;

        svc.bookmark(&bob, &c.id).await.unwrap();
        assert!(matches!(
            svc.bookmark(&bob, &c.id).await,
            Err(EngagementServiceError::AlreadyExists(_))
        ));
        assert!(svc.bookmark_status(&bob, &c.id).await.unwrap().is_bookmarked);
        assert!(!svc.bookmark_status(&alice, &c.id).await.unwrap().is_bookmarked);
        assert_eq!(svc.my_bookmarks(&bob, &ListParams::default()).await.unwrap().total, 1);
        svc.unbookmark(&bob, &c.id).await.unwrap();
        assert_eq!(svc.my_bookmarks(&bob, &ListParams::default()).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_comment_permissions() {
        let pool = setup_pool().await;
        let svc = service(&pool);
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let admin = insert_admin(&pool, "admin").await;
        let c = insert_curriculum(&pool, &alice, "Open plan", Visibility::Public, 1).await;

        assert!(matches!(
            svc.add_comment(&bob, &c.id, "   ").await,
            Err(EngagementServiceError::ValidationError(_))
        ));
        let comment = svc.add_comment(&bob, &c.id, "Great plan").await.unwrap();
        assert_eq!(comment.user_name, "bob");

        assert!(matches!(
            svc.update_comment(&alice, &comment.id, "hijack").await,
            Err(EngagementServiceError::PermissionDenied)
        ));
        let edited = svc.update_comment(&bob, &comment.id, "Great plan!").await.unwrap();
        assert_eq!(edited.content, "Great plan!");
        assert_eq!(svc.get_comment(&alice, &comment.id).await.unwrap().content, "Great plan!");

        svc.delete_comment(&admin, &comment.id).await.unwrap();
        assert!(matches!(
            svc.get_comment(&bob, &comment.id).await,
            Err(EngagementServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_social_stats() {
        let pool = setup_pool().await;
        let svc = service(&pool);
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let c = insert_curriculum(&pool, &alice, "Open plan", Visibility::Public, 1).await;

        svc.like(&bob, &c.id).await.unwrap();
        svc.bookmark(&bob, &c.id).await.unwrap();
        svc.add_comment(&bob, &c.id, "one").await.unwrap();
        svc.add_comment(&alice, &c.id, "two").await.unwrap();

        let stats = svc.curriculum_stats(&bob, &c.id).await.unwrap();
        assert_eq!((stats.like_count, stats.comment_count, stats.bookmark_count), (1, 2, 1));
        assert!(stats.is_liked_by_user && stats.is_bookmarked_by_user);

        let mine = svc.user_stats(&alice).await.unwrap();
        assert_eq!(mine.likes_received, 1);
        assert_eq!(mine.comments_received, 2);
        assert_eq!(mine.comments_written, 1);
        assert_eq!(svc.user_stats(&bob).await.unwrap().likes_given, 1);
        assert_eq!(svc.my_comments(&bob, &ListParams::default()).await.unwrap().total, 1);
    }
}
