//! Tags and categories used to classify curricula.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{new_id, ValidationError};

/// Tags a single curriculum may carry
pub const MAX_TAGS_PER_CURRICULUM: usize = 10;

static TAG_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9가-힣]+$").expect("valid tag regex"));

static CATEGORY_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9가-힣\s\-]+$").expect("valid category regex"));

static COLOR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-F]{6}$").expect("valid color regex"));

/// Tag name: lowercase, 1 to 20 letters, digits or Hangul syllables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagName(String);

impl TagName {
    pub const MAX_LENGTH: usize = 20;

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let name = raw.trim().to_lowercase();
        let len = name.chars().count();
        if len == 0 || len > Self::MAX_LENGTH {
            return Err(ValidationError::new(format!(
                "Tag name must be between 1 and {} characters",
                Self::MAX_LENGTH
            )));
        }
        if !TAG_NAME_PATTERN.is_match(&name) {
            return Err(ValidationError::new(
                "Tag name may only contain letters, digits and Hangul",
            ));
        }
        Ok(Self(name))
    }

    /// Parse a list of names, skipping blanks and duplicates.
    pub fn parse_list<S: AsRef<str>>(raw: &[S]) -> Result<Vec<Self>, ValidationError> {
        let mut names: Vec<Self> = Vec::new();
        for item in raw.iter().map(AsRef::as_ref).filter(|s| !s.trim().is_empty()) {
            let name = Self::parse(item)?;
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub usage_count: i64,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    pub const POPULAR_THRESHOLD: i64 = 10;

    pub fn new(name: TagName, created_by: &str) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.0,
            usage_count: 0,
            created_by: Some(created_by.to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_popular(&self) -> bool {
        self.usage_count >= Self::POPULAR_THRESHOLD
    }

    pub fn is_unused(&self) -> bool {
        self.usage_count == 0
    }
}

/// Category name: 2 to 30 letters, digits, Hangul, spaces or hyphens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryName(String);

impl CategoryName {
    pub const MIN_LENGTH: usize = 2;
    pub const MAX_LENGTH: usize = 30;

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let name = raw.trim();
        let len = name.chars().count();
        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&len) {
            return Err(ValidationError::new(format!(
                "Category name must be between {} and {} characters",
                Self::MIN_LENGTH,
                Self::MAX_LENGTH
            )));
        }
        if !CATEGORY_NAME_PATTERN.is_match(name) {
            return Err(ValidationError::new(
                "Category name may only contain letters, digits, Hangul, spaces and hyphens",
            ));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// `#RRGGBB` color, normalized to uppercase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagColor(String);

impl TagColor {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let color = raw.trim().to_uppercase();
        if !COLOR_PATTERN.is_match(&color) {
            return Err(ValidationError::new("Color must be a hex value like #1A2B3C"));
        }
        Ok(Self(color))
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub icon: Option<String>,
    pub sort_order: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn new(
        name: CategoryName,
        description: Option<String>,
        color: TagColor,
        icon: Option<String>,
        sort_order: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into_inner(),
            description: description.filter(|d| !d.trim().is_empty()),
            color: color.into_inner(),
            icon: icon.filter(|i| !i.trim().is_empty()),
            sort_order,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
