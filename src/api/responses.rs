//! Shared API response types
//!
//! Entities that serialize as-is (users, curricula, tags, categories) are
//! returned directly. The types here add derived fields.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{snippet, Comment, Feedback, FeedbackGrade, Summary};

/// Snippet length on a single summary
pub const SUMMARY_SNIPPET: usize = 100;
/// Snippet length on summary list items
pub const SUMMARY_LIST_SNIPPET: usize = 150;
const COMMENT_SNIPPET: usize = 50;

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub id: String,
    pub curriculum_id: String,
    pub week_number: i64,
    pub owner_id: String,
    pub content: String,
    pub content_length: usize,
    pub snippet: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SummaryResponse {
    pub fn new(summary: Summary, snippet_len: usize) -> Self {
        Self {
            content_length: summary.content_length(),
            snippet: snippet(&summary.content, snippet_len),
            id: summary.id,
            curriculum_id: summary.curriculum_id,
            week_number: summary.week_number,
            owner_id: summary.owner_id,
            content: summary.content,
            created_at: summary.created_at,
            updated_at: summary.updated_at,
        }
    }

    pub fn list_item(summary: Summary) -> Self {
        Self::new(summary, SUMMARY_LIST_SNIPPET)
    }
}

impl From<Summary> for SummaryResponse {
    fn from(summary: Summary) -> Self {
        Self::new(summary, SUMMARY_SNIPPET)
    }
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub id: String,
    pub summary_id: String,
    pub comment: String,
    pub score: f64,
    pub grade: FeedbackGrade,
    pub is_good: bool,
    pub is_poor: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Feedback> for FeedbackResponse {
    fn from(feedback: Feedback) -> Self {
        Self {
            grade: feedback.grade(),
            is_good: feedback.is_good(),
            is_poor: feedback.is_poor(),
            id: feedback.id,
            summary_id: feedback.summary_id,
            comment: feedback.comment,
            score: feedback.score,
            created_at: feedback.created_at,
            updated_at: feedback.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: String,
    pub curriculum_id: String,
    pub user_id: String,
    pub user_name: String,
    pub content: String,
    pub content_snippet: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            content_snippet: snippet(&comment.content, COMMENT_SNIPPET),
            id: comment.id,
            curriculum_id: comment.curriculum_id,
            user_id: comment.user_id,
            user_name: comment.user_name,
            content: comment.content,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommentContent, SummaryContent};

    #[test]
    fn test_summary_snippets() {
        let content = "x".repeat(200);
        let summary = Summary::new("c1", 1, "u1", SummaryContent::parse(&content).unwrap());

        let single = SummaryResponse::from(summary.clone());
        assert_eq!(single.content_length, 200);
        assert_eq!(single.snippet.chars().count(), SUMMARY_SNIPPET + 3);

        let item = SummaryResponse::list_item(summary);
        assert!(item.snippet.ends_with("..."));
        assert_eq!(item.snippet.chars().count(), SUMMARY_LIST_SNIPPET + 3);
    }

    #[test]
    fn test_feedback_response_derives_grade() {
        let feedback = Feedback::new("s1", "Solid", 7.5).unwrap();
        let response = FeedbackResponse::from(feedback);
        assert_eq!(response.grade, FeedbackGrade::from_score(7.5));
        assert!(response.is_good);
        assert!(!response.is_poor);
    }

    #[test]
    fn test_comment_snippet_keeps_short_content() {
        let comment = Comment::new("c1", "u1", "bob", CommentContent::parse("Nice").unwrap());
        assert_eq!(CommentResponse::from(comment).content_snippet, "Nice");
    }
}
