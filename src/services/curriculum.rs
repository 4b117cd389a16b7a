//! Curriculum service
//!
//! Ownership and visibility rules, the per-user curriculum limit, week and
//! lesson editing, and AI generation. Every successful mutation invalidates
//! the cached public feed.

use crate::cache::MemoryCache;
use crate::db::repositories::CurriculumRepository;
use crate::metrics::{self, Event};
use crate::models::{
    Curriculum, Difficulty, ListParams, PagedResult, Title, User, ValidationError, Visibility,
    WeekSchedule, MAX_CURRICULA_PER_USER, MAX_WEEKS,
};
use crate::services::feed::invalidate_feed;
use crate::services::llm::{parse_curriculum, LlmClient, LlmError};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

/// Error types for curriculum service operations
#[derive(Debug, thiserror::Error)]
pub enum CurriculumServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Curriculum not found")]
    NotFound,

    #[error("Week {0} not found")]
    WeekNotFound(i64),

    #[error("You do not have permission to modify this curriculum")]
    PermissionDenied,

    #[error("A user can own at most 10 curricula")]
    CountOver,

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ValidationError> for CurriculumServiceError {
    fn from(e: ValidationError) -> Self {
        CurriculumServiceError::ValidationError(e.0)
    }
}

/// One week as submitted by a client
#[derive(Debug, Clone, Deserialize)]
pub struct WeekInput {
    pub week_number: i64,
    #[serde(default)]
    pub title: Option<String>,
    pub lessons: Vec<String>,
}

impl WeekInput {
    fn into_week(self) -> Result<WeekSchedule, ValidationError> {
        WeekSchedule::new(self.week_number, self.title.as_deref(), self.lessons)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCurriculumInput {
    pub title: String,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub week_schedules: Vec<WeekInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCurriculumInput {
    pub title: Option<String>,
    pub visibility: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateCurriculumInput {
    pub goal: String,
    pub period: i64,
    pub difficulty: String,
    #[serde(default)]
    pub details: String,
}

fn parse_visibility(raw: Option<&str>) -> Result<Option<Visibility>, ValidationError> {
    raw.map(str::parse).transpose()
}

pub struct CurriculumService {
    curriculum_repo: Arc<dyn CurriculumRepository>,
    llm: Arc<dyn LlmClient>,
    cache: Arc<MemoryCache>,
}

impl CurriculumService {
    pub fn new(
        curriculum_repo: Arc<dyn CurriculumRepository>,
        llm: Arc<dyn LlmClient>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self {
            curriculum_repo,
            llm,
            cache,
        }
    }

    async fn ensure_capacity(&self, owner_id: &str) -> Result<(), CurriculumServiceError> {
        if self.curriculum_repo.count_by_owner(owner_id).await? >= MAX_CURRICULA_PER_USER {
            return Err(CurriculumServiceError::CountOver);
        }
        Ok(())
    }

    /// Curriculum `id` if `user` may see it; hidden ones report `NotFound`
    pub async fn load_viewable(&self, user: &User, id: &str) -> Result<Curriculum, CurriculumServiceError> {
        match self.curriculum_repo.get_by_id(id).await? {
            Some(c) if c.can_view(&user.id, user.is_admin()) => Ok(c),
            _ => Err(CurriculumServiceError::NotFound),
        }
    }

    /// Curriculum `id` if `user` owns it or is an admin
    pub async fn load_modifiable(&self, user: &User, id: &str) -> Result<Curriculum, CurriculumServiceError> {
        let curriculum = self
            .curriculum_repo
            .get_by_id(id)
            .await?
            .ok_or(CurriculumServiceError::NotFound)?;
        if !curriculum.can_modify(&user.id, user.is_admin()) {
            return Err(CurriculumServiceError::PermissionDenied);
        }
        Ok(curriculum)
    }

    async fn save(&self, curriculum: &Curriculum) -> Result<(), CurriculumServiceError> {
        self.curriculum_repo.update(curriculum).await?;
        invalidate_feed(&self.cache).await;
        Ok(())
    }

    pub async fn create(
        &self,
        user: &User,
        input: CreateCurriculumInput,
    ) -> Result<Curriculum, CurriculumServiceError> {
        let title = Title::parse(&input.title)?;
        let visibility = parse_visibility(input.visibility.as_deref())?.unwrap_or_default();
        let weeks = input
            .week_schedules
            .into_iter()
            .map(WeekInput::into_week)
            .collect::<Result<Vec<_>, _>>()?;
        let curriculum = Curriculum::new(&user.id, title, visibility, weeks)?;

        self.ensure_capacity(&user.id).await?;
        self.curriculum_repo.create(&curriculum).await?;
        invalidate_feed(&self.cache).await;

        tracing::info!(curriculum_id = %curriculum.id, owner_id = %user.id, "Curriculum created");
        metrics::record(Event::CurriculumCreation);
        Ok(curriculum)
    }

    /// Ask the LLM for a schedule and store it as a private curriculum.
    ///
    /// The title is prefixed with the creation time (`%y%m%d%H%M`) and cut to
    /// the maximum title length.
    pub async fn generate(
        &self,
        user: &User,
        input: GenerateCurriculumInput,
    ) -> Result<Curriculum, CurriculumServiceError> {
        let goal = input.goal.trim();
        if goal.is_empty() {
            return Err(ValidationError::new("Goal must not be empty").into());
        }
        if !(1..=MAX_WEEKS).contains(&input.period) {
            return Err(ValidationError::new(format!(
                "Period must be between 1 and {} weeks",
                MAX_WEEKS
            ))
            .into());
        }
        let difficulty: Difficulty = input.difficulty.parse()?;
        self.ensure_capacity(&user.id).await?;

        let response = self
            .llm
            .generate_curriculum(goal, input.period, difficulty, input.details.trim())
            .await?;
        let generated = parse_curriculum(&response)?;

        let base = generated.title.as_deref().unwrap_or(goal);
        let title = Title::truncated(&format!("{} {}", Utc::now().format("%y%m%d%H%M"), base))?;
        let curriculum = Curriculum::new(&user.id, title, Visibility::Private, generated.weeks)?;
        self.curriculum_repo.create(&curriculum).await?;

        tracing::info!(
            curriculum_id = %curriculum.id,
            weeks = curriculum.total_weeks(),
            "Curriculum generated"
        );
        metrics::record(Event::CurriculumCreation);
        Ok(curriculum)
    }

    pub async fn list_mine(
        &self,
        user: &User,
        params: &ListParams,
    ) -> Result<PagedResult<Curriculum>, CurriculumServiceError> {
        let (items, total) = self.curriculum_repo.list_by_owner(&user.id, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn list_public(&self, params: &ListParams) -> Result<PagedResult<Curriculum>, CurriculumServiceError> {
        let (items, total) = self.curriculum_repo.list_public(params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Public curricula of the users `user` follows
    pub async fn list_following(
        &self,
        user: &User,
        params: &ListParams,
    ) -> Result<PagedResult<Curriculum>, CurriculumServiceError> {
        let (items, total) = self
            .curriculum_repo
            .list_public_followed_by(&user.id, params)
            .await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get(&self, user: &User, id: &str) -> Result<Curriculum, CurriculumServiceError> {
        self.load_viewable(user, id).await
    }

    pub async fn update(
        &self,
        user: &User,
        id: &str,
        input: UpdateCurriculumInput,
    ) -> Result<Curriculum, CurriculumServiceError> {
        let mut curriculum = self.load_modifiable(user, id).await?;
        if let Some(title) = input.title.as_deref() {
            curriculum.title = Title::parse(title)?.into_inner();
        }
        if let Some(visibility) = parse_visibility(input.visibility.as_deref())? {
            curriculum.visibility = visibility;
        }
        curriculum.touch();
        self.save(&curriculum).await?;

        tracing::info!(curriculum_id = %curriculum.id, "Curriculum updated");
        Ok(curriculum)
    }

    pub async fn delete(&self, user: &User, id: &str) -> Result<(), CurriculumServiceError> {
        let curriculum = self.load_modifiable(user, id).await?;
        if !self.curriculum_repo.delete(&curriculum.id).await? {
            return Err(CurriculumServiceError::NotFound);
        }
        invalidate_feed(&self.cache).await;
        tracing::info!(curriculum_id = %id, "Curriculum deleted");
        Ok(())
    }

    /// Insert a week at its number, shifting that week and later ones back
    pub async fn insert_week(
        &self,
        user: &User,
        id: &str,
        input: WeekInput,
    ) -> Result<Curriculum, CurriculumServiceError> {
        let mut curriculum = self.load_modifiable(user, id).await?;
        let week = input.into_week()?;
        curriculum.insert_week_and_shift(week);
        self.save(&curriculum).await?;
        Ok(curriculum)
    }

    pub async fn remove_week(
        &self,
        user: &User,
        id: &str,
        week_number: i64,
    ) -> Result<Curriculum, CurriculumServiceError> {
        let mut curriculum = self.load_modifiable(user, id).await?;
        if !curriculum.remove_week_and_shift(week_number) {
            return Err(CurriculumServiceError::WeekNotFound(week_number));
        }
        self.save(&curriculum).await?;
        Ok(curriculum)
    }

    async fn edit_week<F>(
        &self,
        user: &User,
        id: &str,
        week_number: i64,
        edit: F,
    ) -> Result<Curriculum, CurriculumServiceError>
    where
        F: FnOnce(&mut WeekSchedule) -> Result<(), ValidationError> + Send,
    {
        let mut curriculum = self.load_modifiable(user, id).await?;
        let week = curriculum
            .week_mut(week_number)
            .ok_or(CurriculumServiceError::WeekNotFound(week_number))?;
        edit(week)?;
        curriculum.touch();
        self.save(&curriculum).await?;
        Ok(curriculum)
    }

    /// Insert a lesson at `index`, or append when `None`
    pub async fn add_lesson(
        &self,
        user: &User,
        id: &str,
        week_number: i64,
        lesson: &str,
        index: Option<usize>,
    ) -> Result<Curriculum, CurriculumServiceError> {
        self.edit_week(user, id, week_number, |week| week.add_lesson(lesson, index))
            .await
    }

    pub async fn update_lesson(
        &self,
        user: &User,
        id: &str,
        week_number: i64,
        index: usize,
        lesson: &str,
    ) -> Result<Curriculum, CurriculumServiceError> {
        self.edit_week(user, id, week_number, |week| week.update_lesson(index, lesson))
            .await
    }

    pub async fn delete_lesson(
        &self,
        user: &User,
        id: &str,
        week_number: i64,
        index: usize,
    ) -> Result<Curriculum, CurriculumServiceError> {
        self.edit_week(user, id, week_number, |week| week.remove_lesson(index).map(|_| ()))
            .await
    }
}
