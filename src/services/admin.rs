//! Admin curriculum management
//!
//! Unrestricted access to every curriculum. Callers are already checked for
//! the admin role by the router. User administration goes through
//! [`crate::services::UserService`].

use crate::cache::MemoryCache;
use crate::db::repositories::CurriculumRepository;
use crate::models::{Curriculum, ListParams, PagedResult, ValidationError, Visibility};
use crate::services::feed::invalidate_feed;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AdminServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Curriculum not found")]
    CurriculumNotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ValidationError> for AdminServiceError {
    fn from(e: ValidationError) -> Self {
        AdminServiceError::ValidationError(e.0)
    }
}

pub struct AdminService {
    curriculum_repo: Arc<dyn CurriculumRepository>,
    cache: Arc<MemoryCache>,
}

impl AdminService {
    pub fn new(curriculum_repo: Arc<dyn CurriculumRepository>, cache: Arc<MemoryCache>) -> Self {
        Self { curriculum_repo, cache }
    }

    pub async fn list_curricula(
        &self,
        owner_id: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<Curriculum>, AdminServiceError> {
        let owner_id = owner_id.map(str::trim).filter(|s| !s.is_empty());
        let (items, total) = self.curriculum_repo.list_all(owner_id, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get_curriculum(&self, id: &str) -> Result<Curriculum, AdminServiceError> {
        self.curriculum_repo
            .get_by_id(id)
            .await?
            .ok_or(AdminServiceError::CurriculumNotFound)
    }

    pub async fn set_visibility(&self, id: &str, visibility: &str) -> Result<Curriculum, AdminServiceError> {
        let visibility: Visibility = visibility.parse()?;
        let mut curriculum = self.get_curriculum(id).await?;
        if curriculum.visibility != visibility {
            curriculum.visibility = visibility;
            curriculum.touch();
            self.curriculum_repo.update(&curriculum).await?;
            invalidate_feed(&self.cache).await;
            tracing::info!(curriculum_id = %curriculum.id, visibility = %visibility, "Visibility changed by admin");
        }
        Ok(curriculum)
    }

    pub async fn delete_curriculum(&self, id: &str) -> Result<(), AdminServiceError> {
        if !self.curriculum_repo.delete(id).await? {
            return Err(AdminServiceError::CurriculumNotFound);
        }
        invalidate_feed(&self.cache).await;
        tracing::info!(curriculum_id = %id, "Curriculum deleted by admin");
        Ok(())
    }
}
