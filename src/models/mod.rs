//! Data models
//!
//! Entities, validated value types and the pagination containers shared by
//! the repositories, services and API handlers.

mod curriculum;
mod feed;
mod learning;
mod pagination;
mod social;
mod taxonomy;
mod user;

pub use curriculum::{
    Curriculum, CurriculumSummary, Difficulty, Title, Visibility, WeekSchedule,
    MAX_CURRICULA_PER_USER, MAX_LESSONS_PER_WEEK, MAX_LESSON_LENGTH, MAX_WEEKS,
};
pub use feed::{FeedFilter, FeedItem};
pub use learning::{Feedback, FeedbackGrade, Summary, SummaryContent};
pub use pagination::{ListParams, PagedResult};
pub use social::{Bookmark, Comment, CommentContent, Follow, Like};
pub use taxonomy::{Category, CategoryName, Tag, TagColor, TagName, MAX_TAGS_PER_CURRICULUM};
pub use user::{validate_password, Email, User, UserName, UserRole};

/// Error raised when an input value violates a domain rule
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Generate a new entity identifier
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// First `max` characters of `text`, with "..." appended when cut
pub fn snippet(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}
