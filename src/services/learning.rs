//! Learning service
//!
//! Weekly summaries and the AI feedback attached to them.
//!
//! Access rules:
//! - writing a summary needs view access to the curriculum and an existing week
//! - a summary is readable by its author and admins
//! - a summary is editable by its author, the curriculum owner and admins
//! - in curriculum-wide listings, anyone but the owner or an admin only sees
//!   their own summaries

use crate::db::repositories::{CurriculumRepository, FeedbackRepository, SummaryRepository};
use crate::metrics::{self, Event};
use crate::models::{
    Curriculum, Feedback, ListParams, PagedResult, Summary, SummaryContent, User, ValidationError,
};
use crate::services::llm::{parse_feedback, LlmClient, LlmError};
use chrono::Utc;
use std::sync::Arc;

/// Largest page for the caller's own summaries
pub const MY_SUMMARIES_MAX_PER_PAGE: u32 = 50;

/// Error types for learning service operations
#[derive(Debug, thiserror::Error)]
pub enum LearningServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Curriculum not found")]
    CurriculumNotFound,

    #[error("Week {0} not found")]
    WeekNotFound(i64),

    #[error("Summary not found")]
    SummaryNotFound,

    #[error("Feedback not found")]
    FeedbackNotFound,

    #[error("You do not have permission to access this summary")]
    PermissionDenied,

    #[error("Feedback already exists for this summary")]
    FeedbackAlreadyExists,

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ValidationError> for LearningServiceError {
    fn from(e: ValidationError) -> Self {
        LearningServiceError::ValidationError(e.0)
    }
}

pub struct LearningService {
    summary_repo: Arc<dyn SummaryRepository>,
    feedback_repo: Arc<dyn FeedbackRepository>,
    curriculum_repo: Arc<dyn CurriculumRepository>,
    llm: Arc<dyn LlmClient>,
}

impl LearningService {
    pub fn new(
        summary_repo: Arc<dyn SummaryRepository>,
        feedback_repo: Arc<dyn FeedbackRepository>,
        curriculum_repo: Arc<dyn CurriculumRepository>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            summary_repo,
            feedback_repo,
            curriculum_repo,
            llm,
        }
    }

    async fn viewable_curriculum(&self, user: &User, id: &str) -> Result<Curriculum, LearningServiceError> {
        match self.curriculum_repo.get_by_id(id).await? {
            Some(c) if c.can_view(&user.id, user.is_admin()) => Ok(c),
            _ => Err(LearningServiceError::CurriculumNotFound),
        }
    }

    /// `None` lists everyone's rows; otherwise only the caller's
    fn owner_filter<'a>(user: &'a User, curriculum: &Curriculum) -> Option<&'a str> {
        if user.is_admin() || curriculum.owner_id == user.id {
            None
        } else {
            Some(user.id.as_str())
        }
    }

    async fn load_summary(&self, id: &str) -> Result<Summary, LearningServiceError> {
        self.summary_repo
            .get_by_id(id)
            .await?
            .ok_or(LearningServiceError::SummaryNotFound)
    }

    async fn readable_summary(&self, user: &User, id: &str) -> Result<Summary, LearningServiceError> {
        let summary = self.load_summary(id).await?;
        if !(user.is_admin() || summary.owner_id == user.id) {
            return Err(LearningServiceError::PermissionDenied);
        }
        Ok(summary)
    }

    async fn modifiable_summary(&self, user: &User, id: &str) -> Result<Summary, LearningServiceError> {
        let summary = self.load_summary(id).await?;
        if user.is_admin() || summary.owner_id == user.id {
            return Ok(summary);
        }
        let curriculum_owner = self
            .curriculum_repo
            .get_by_id(&summary.curriculum_id)
            .await?
            .map(|c| c.owner_id);
        if curriculum_owner.as_deref() == Some(user.id.as_str()) {
            Ok(summary)
        } else {
            Err(LearningServiceError::PermissionDenied)
        }
    }

    pub async fn create_summary(
        &self,
        user: &User,
        curriculum_id: &str,
        week_number: i64,
        content: &str,
    ) -> Result<Summary, LearningServiceError> {
        let curriculum = self.viewable_curriculum(user, curriculum_id).await?;
        if curriculum.week(week_number).is_none() {
            return Err(LearningServiceError::WeekNotFound(week_number));
        }
        let content = SummaryContent::parse(content)?;

        let summary = Summary::new(&curriculum.id, week_number, &user.id, content);
        self.summary_repo.create(&summary).await?;
        tracing::info!(summary_id = %summary.id, curriculum_id = %curriculum.id, week_number, "Summary created");
        metrics::record(Event::SummaryCreation);
        Ok(summary)
    }

    pub async fn list_week_summaries(
        &self,
        user: &User,
        curriculum_id: &str,
        week_number: i64,
        params: &ListParams,
    ) -> Result<PagedResult<Summary>, LearningServiceError> {
        let curriculum = self.viewable_curriculum(user, curriculum_id).await?;
        if curriculum.week(week_number).is_none() {
            return Err(LearningServiceError::WeekNotFound(week_number));
        }
        let (items, total) = self
            .summary_repo
            .list_by_week(
                &curriculum.id,
                week_number,
                Self::owner_filter(user, &curriculum),
                params,
            )
            .await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn list_curriculum_summaries(
        &self,
        user: &User,
        curriculum_id: &str,
        params: &ListParams,
    ) -> Result<PagedResult<Summary>, LearningServiceError> {
        let curriculum = self.viewable_curriculum(user, curriculum_id).await?;
        let (items, total) = self
            .summary_repo
            .list_by_curriculum(&curriculum.id, Self::owner_filter(user, &curriculum), params)
            .await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn list_my_summaries(
        &self,
        user: &User,
        params: &ListParams,
    ) -> Result<PagedResult<Summary>, LearningServiceError> {
        let (items, total) = self.summary_repo.list_by_owner(&user.id, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get_summary(&self, user: &User, id: &str) -> Result<Summary, LearningServiceError> {
        self.readable_summary(user, id).await
    }

    pub async fn update_summary(
        &self,
        user: &User,
        id: &str,
        content: &str,
    ) -> Result<Summary, LearningServiceError> {
        let mut summary = self.modifiable_summary(user, id).await?;
        summary.content = SummaryContent::parse(content)?.into_inner();
        summary.updated_at = Utc::now();
        self.summary_repo.update(&summary).await?;
        tracing::info!(summary_id = %summary.id, "Summary updated");
        Ok(summary)
    }

    pub async fn delete_summary(&self, user: &User, id: &str) -> Result<(), LearningServiceError> {
        let summary = self.modifiable_summary(user, id).await?;
        self.summary_repo.delete(&summary.id).await?;
        tracing::info!(summary_id = %summary.id, "Summary deleted");
        Ok(())
    }

    /// Ask the LLM to grade a summary against its week's lessons.
    ///
    /// A summary gets at most one feedback.
    pub async fn generate_feedback(&self, user: &User, summary_id: &str) -> Result<Feedback, LearningServiceError> {
        let summary = self.modifiable_summary(user, summary_id).await?;
        if self.feedback_repo.get_by_summary_id(&summary.id).await?.is_some() {
            return Err(LearningServiceError::FeedbackAlreadyExists);
        }

        let lessons = self
            .curriculum_repo
            .get_by_id(&summary.curriculum_id)
            .await?
            .and_then(|c| c.week(summary.week_number).map(|w| w.lessons.clone()))
            .unwrap_or_default();

        let response = self.llm.generate_feedback(&lessons, &summary.content).await?;
        let generated = parse_feedback(&response)?;
        let feedback = Feedback::new(&summary.id, &generated.comment, generated.score)?;
        self.feedback_repo.create(&feedback).await?;

        tracing::info!(feedback_id = %feedback.id, summary_id = %summary.id, score = feedback.score, "Feedback generated");
        metrics::record(Event::FeedbackCreation);
        Ok(feedback)
    }

    pub async fn get_summary_feedback(&self, user: &User, summary_id: &str) -> Result<Feedback, LearningServiceError> {
        let summary = self.readable_summary(user, summary_id).await?;
        self.feedback_repo
            .get_by_summary_id(&summary.id)
            .await?
            .ok_or(LearningServiceError::FeedbackNotFound)
    }

    async fn load_feedback(&self, id: &str) -> Result<Feedback, LearningServiceError> {
        self.feedback_repo
            .get_by_id(id)
            .await?
            .ok_or(LearningServiceError::FeedbackNotFound)
    }

    pub async fn get_feedback(&self, user: &User, id: &str) -> Result<Feedback, LearningServiceError> {
        let feedback = self.load_feedback(id).await?;
        self.readable_summary(user, &feedback.summary_id).await?;
        Ok(feedback)
    }

    pub async fn delete_feedback(&self, user: &User, id: &str) -> Result<(), LearningServiceError> {
        let feedback = self.load_feedback(id).await?;
        self.modifiable_summary(user, &feedback.summary_id).await?;
        self.feedback_repo.delete(&feedback.id).await?;
        tracing::info!(feedback_id = %feedback.id, "Feedback deleted");
        Ok(())
    }

    pub async fn list_curriculum_feedbacks(
        &self,
        user: &User,
        curriculum_id: &str,
        params: &ListParams,
    ) -> Result<PagedResult<Feedback>, LearningServiceError> {
        let curriculum = self.viewable_curriculum(user, curriculum_id).await?;
        let (items, total) = self
            .feedback_repo
            .list_by_curriculum(&curriculum.id, Self::owner_filter(user, &curriculum), params)
            .await?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Feedbacks on the caller's summaries, optionally within a score range
    pub async fn list_my_feedbacks(
        &self,
        user: &User,
        min_score: Option<f64>,
        max_score: Option<f64>,
        params: &ListParams,
    ) -> Result<PagedResult<Feedback>, LearningServiceError> {
        for score in [min_score, max_score].into_iter().flatten() {
            if !(Feedback::MIN_SCORE..=Feedback::MAX_SCORE).contains(&score) {
                return Err(ValidationError::new("Score filters must be between 0 and 10").into());
            }
        }
        if let (Some(min), Some(max)) = (min_score, max_score) {
            if min > max {
                return Err(ValidationError::new("min_score must not exceed max_score").into());
            }
        }
        let (items, total) = self
            .feedback_repo
            .list_by_owner(&user.id, min_score, max_score, params)
            .await?;
        Ok(PagedResult::new(items, total, params))
    }
}
