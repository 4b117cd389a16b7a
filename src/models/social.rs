//! Social graph and engagement records: follows, likes, bookmarks, comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, ValidationError};

/// `follower_id` follows `followee_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub id: String,
    pub follower_id: String,
    pub followee_id: String,
    pub created_at: DateTime<Utc>,
}

impl Follow {
    pub fn new(follower_id: &str, followee_id: &str) -> Result<Self, ValidationError> {
        if follower_id == followee_id {
            return Err(ValidationError::new("Users cannot follow themselves"));
        }
        Ok(Self {
            id: new_id(),
            follower_id: follower_id.to_string(),
            followee_id: followee_id.to_string(),
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub id: String,
    pub curriculum_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl Like {
    pub fn new(curriculum_id: &str, user_id: &str) -> Self {
        Self {
            id: new_id(),
            curriculum_id: curriculum_id.to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub curriculum_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl Bookmark {
    pub fn new(curriculum_id: &str, user_id: &str) -> Self {
        Self {
            id: new_id(),
            curriculum_id: curriculum_id.to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Comment body: 1 to 1000 characters after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentContent(String);

impl CommentContent {
    pub const MAX_LENGTH: usize = 1000;

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let content = raw.trim();
        if content.is_empty() {
            return Err(ValidationError::new("Comment must not be empty"));
        }
        if content.chars().count() > Self::MAX_LENGTH {
            return Err(ValidationError::new(format!(
                "Comment must be at most {} characters",
                Self::MAX_LENGTH
            )));
        }
        Ok(Self(content.to_string()))
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// A comment on a curriculum, carrying the author's display name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub curriculum_id: String,
    pub user_id: String,
    pub user_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(curriculum_id: &str, user_id: &str, user_name: &str, content: CommentContent) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            curriculum_id: curriculum_id.to_string(),
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            content: content.into_inner(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_modify(&self, user_id: &str, is_admin: bool) -> bool {
        is_admin || self.user_id == user_id
    }
}
