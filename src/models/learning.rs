//! Learning records: weekly summaries written by learners and the AI
//! feedback attached to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{new_id, ValidationError};

/// Summary body: 100 to 5000 characters after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryContent(String);

impl SummaryContent {
    pub const MIN_LENGTH: usize = 100;
    pub const MAX_LENGTH: usize = 5000;

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let content = raw.trim();
        let len = content.chars().count();
        if len < Self::MIN_LENGTH {
            return Err(ValidationError::new(format!(
                "Summary must be at least {} characters",
                Self::MIN_LENGTH
            )));
        }
        if len > Self::MAX_LENGTH {
            return Err(ValidationError::new(format!(
                "Summary must be at most {} characters",
                Self::MAX_LENGTH
            )));
        }
        Ok(Self(content.to_string()))
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// A learner's written summary of one curriculum week
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: String,
    pub curriculum_id: String,
    pub week_number: i64,
    pub owner_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Summary {
    pub fn new(curriculum_id: &str, week_number: i64, owner_id: &str, content: SummaryContent) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            curriculum_id: curriculum_id.to_string(),
            week_number,
            owner_id: owner_id.to_string(),
            content: content.into_inner(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn content_length(&self) -> usize {
        self.content.chars().count()
    }
}

/// Letter grade derived from a feedback score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeedbackGrade {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "D")]
    D,
}

impl FeedbackGrade {
    pub const ALL: [FeedbackGrade; 7] = [
        FeedbackGrade::APlus,
        FeedbackGrade::A,
        FeedbackGrade::BPlus,
        FeedbackGrade::B,
        FeedbackGrade::CPlus,
        FeedbackGrade::C,
        FeedbackGrade::D,
    ];

    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 9.0 => FeedbackGrade::APlus,
            s if s >= 8.0 => FeedbackGrade::A,
            s if s >= 7.0 => FeedbackGrade::BPlus,
            s if s >= 6.0 => FeedbackGrade::B,
            s if s >= 5.0 => FeedbackGrade::CPlus,
            s if s >= 4.0 => FeedbackGrade::C,
            _ => FeedbackGrade::D,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackGrade::APlus => "A+",
            FeedbackGrade::A => "A",
            FeedbackGrade::BPlus => "B+",
            FeedbackGrade::B => "B",
            FeedbackGrade::CPlus => "C+",
            FeedbackGrade::C => "C",
            FeedbackGrade::D => "D",
        }
    }
}

impl fmt::Display for FeedbackGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AI feedback on a summary. Each summary has at most one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: String,
    pub summary_id: String,
    pub comment: String,
    pub score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feedback {
    pub const MIN_SCORE: f64 = 0.0;
    pub const MAX_SCORE: f64 = 10.0;

    pub fn new(summary_id: &str, comment: &str, score: f64) -> Result<Self, ValidationError> {
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(ValidationError::new("Feedback comment must not be empty"));
        }
        if !score.is_finite() || !(Self::MIN_SCORE..=Self::MAX_SCORE).contains(&score) {
            return Err(ValidationError::new("Feedback score must be between 0 and 10"));
        }
        let now = Utc::now();
        Ok(Self {
            id: new_id(),
            summary_id: summary_id.to_string(),
            comment: comment.to_string(),
            score,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn grade(&self) -> FeedbackGrade {
        FeedbackGrade::from_score(self.score)
    }

    pub fn is_good(&self) -> bool {
        self.score >= 7.0
    }

    pub fn is_poor(&self) -> bool {
        self.score <= 4.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_summary_content_bounds() {
        assert!(SummaryContent::parse(&"a".repeat(99)).is_err());
        assert!(SummaryContent::parse(&format!("  {}  ", "a".repeat(100))).is_ok());
        assert!(SummaryContent::parse(&"a".repeat(5001)).is_err());
    }

    #[test]
    fn test_summary_content_counts_characters() {
        // 100 Hangul syllables are 300 bytes but only 100 characters
        assert!(SummaryContent::parse(&"가".repeat(100)).is_ok());
    }

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(FeedbackGrade::from_score(10.0), FeedbackGrade::APlus);
        assert_eq!(FeedbackGrade::from_score(9.0), FeedbackGrade::APlus);
        assert_eq!(FeedbackGrade::from_score(8.9), FeedbackGrade::A);
        assert_eq!(FeedbackGrade::from_score(7.0), FeedbackGrade::BPlus);
        assert_eq!(FeedbackGrade::from_score(6.5), FeedbackGrade::B);
        assert_eq!(FeedbackGrade::from_score(5.0), FeedbackGrade::CPlus);
        assert_eq!(FeedbackGrade::from_score(4.0), FeedbackGrade::C);
        assert_eq!(FeedbackGrade::from_score(3.99), FeedbackGrade::D);
    }

    #[test]
    fn test_grade_serializes_as_letter() {
        assert_eq!(serde_json::to_string(&FeedbackGrade::BPlus).unwrap(), "\"B+\"");
    }

    #[test]
    fn test_feedback_validation() {
        assert!(Feedback::new("s1", "  ", 5.0).is_err());
        assert!(Feedback::new("s1", "ok", -0.1).is_err());
        assert!(Feedback::new("s1", "ok", 10.1).is_err());
        assert!(Feedback::new("s1", "ok", f64::NAN).is_err());

        let feedback = Feedback::new("s1", " Nice work ", 7.0).unwrap();
        assert_eq!(feedback.comment, "Nice work");
        assert!(feedback.is_good());
        assert!(!feedback.is_poor());
    }

    #[test]
    fn test_poor_feedback() {
        let feedback = Feedback::new("s1", "Needs work", 4.0).unwrap();
        assert!(feedback.is_poor());
        assert_eq!(feedback.grade(), FeedbackGrade::C);
    }

    proptest! {
        #[test]
        fn grade_is_monotonic(a in 0.0f64..=10.0, b in 0.0f64..=10.0) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            // Variants are declared best first
            prop_assert!(FeedbackGrade::from_score(high) <= FeedbackGrade::from_score(low));
        }
    }
}
