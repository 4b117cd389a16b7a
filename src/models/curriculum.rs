//! Curriculum model
//!
//! A curriculum is an ordered set of weekly schedules (1 to 24 weeks), each
//! holding one to five lessons. Week numbers are unique and kept sorted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{new_id, ValidationError};

/// Highest allowed week number
pub const MAX_WEEKS: i64 = 24;
/// Lessons allowed in a single week
pub const MAX_LESSONS_PER_WEEK: usize = 5;
/// Maximum characters per lesson
pub const MAX_LESSON_LENGTH: usize = 100;
/// Curricula a single user may own
pub const MAX_CURRICULA_PER_USER: i64 = 10;

/// Who can see a curriculum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "PUBLIC"),
            Visibility::Private => write!(f, "PRIVATE"),
        }
    }
}

impl FromStr for Visibility {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PUBLIC" => Ok(Visibility::Public),
            "PRIVATE" => Ok(Visibility::Private),
            _ => Err(ValidationError::new(format!("Invalid visibility: {}", s))),
        }
    }
}

/// Target level for generated curricula
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Expert,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Beginner => write!(f, "beginner"),
            Difficulty::Intermediate => write!(f, "intermediate"),
            Difficulty::Expert => write!(f, "expert"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "expert" => Ok(Difficulty::Expert),
            _ => Err(ValidationError::new(format!("Invalid difficulty: {}", s))),
        }
    }
}

/// Curriculum or week title: 2 to 50 characters after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title(String);

impl Title {
    pub const MIN_LENGTH: usize = 2;
    pub const MAX_LENGTH: usize = 50;

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let title = raw.trim();
        let len = title.chars().count();
        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&len) {
            return Err(ValidationError::new(format!(
                "Title must be between {} and {} characters",
                Self::MIN_LENGTH,
                Self::MAX_LENGTH
            )));
        }
        Ok(Self(title.to_string()))
    }

    /// Truncate to the maximum length before validating
    pub fn truncated(raw: &str) -> Result<Self, ValidationError> {
        let cut: String = raw.trim().chars().take(Self::MAX_LENGTH).collect();
        Self::parse(&cut)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

fn validate_week_number(week_number: i64) -> Result<(), ValidationError> {
    if !(1..=MAX_WEEKS).contains(&week_number) {
        return Err(ValidationError::new(format!(
            "Week number must be between 1 and {}",
            MAX_WEEKS
        )));
    }
    Ok(())
}

fn normalize_lesson(raw: &str) -> Result<String, ValidationError> {
    let lesson = raw.trim();
    let len = lesson.chars().count();
    if len == 0 {
        return Err(ValidationError::new("Lesson must not be empty"));
    }
    if len > MAX_LESSON_LENGTH {
        return Err(ValidationError::new(format!(
            "Lesson must be at most {} characters",
            MAX_LESSON_LENGTH
        )));
    }
    Ok(lesson.to_string())
}

/// One week of a curriculum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekSchedule {
    pub week_number: i64,
    pub title: String,
    pub lessons: Vec<String>,
}

impl WeekSchedule {
    /// Build a week, dropping blank lessons and deriving a title when none is given.
    pub fn new(
        week_number: i64,
        title: Option<&str>,
        lessons: Vec<String>,
    ) -> Result<Self, ValidationError> {
        validate_week_number(week_number)?;
        let lessons = Self::normalize_lessons(lessons)?;
        let title = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => Title::parse(title)?.into_inner(),
            None => Self::default_title(week_number, &lessons),
        };
        Ok(Self {
            week_number,
            title,
            lessons,
        })
    }

    /// Trim lessons and drop empty ones; 1 to 5 must remain.
    pub fn normalize_lessons(lessons: Vec<String>) -> Result<Vec<String>, ValidationError> {
        let lessons = lessons
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| normalize_lesson(l))
            .collect::<Result<Vec<_>, _>>()?;
        if lessons.is_empty() {
            return Err(ValidationError::new("A week needs at least one lesson"));
        }
        if lessons.len() > MAX_LESSONS_PER_WEEK {
            return Err(ValidationError::new(format!(
                "A week can have at most {} lessons",
                MAX_LESSONS_PER_WEEK
            )));
        }
        Ok(lessons)
    }

    /// First lesson cut to 50 characters, or "Week N" when that is too short.
    pub fn default_title(week_number: i64, lessons: &[String]) -> String {
        lessons
            .first()
            .and_then(|first| Title::truncated(first).ok())
            .map(Title::into_inner)
            .unwrap_or_else(|| format!("Week {}", week_number))
    }

    pub fn lesson_count(&self) -> usize {
        self.lessons.len()
    }

    /// Insert a lesson at `index` (0..=count), appending when `None`.
    pub fn add_lesson(&mut self, lesson: &str, index: Option<usize>) -> Result<(), ValidationError> {
        let lesson = normalize_lesson(lesson)?;
        if self.lessons.len() >= MAX_LESSONS_PER_WEEK {
            return Err(ValidationError::new(format!(
                "A week can have at most {} lessons",
                MAX_LESSONS_PER_WEEK
            )));
        }
        let index = index.unwrap_or(self.lessons.len());
        if index > self.lessons.len() {
            return Err(ValidationError::new(format!(
                "Lesson index {} out of range (0..={})",
                index,
                self.lessons.len()
            )));
        }
        self.lessons.insert(index, lesson);
        Ok(())
    }

    /// Replace the lesson at `index` (0..count).
    pub fn update_lesson(&mut self, index: usize, lesson: &str) -> Result<(), ValidationError> {
        let lesson = normalize_lesson(lesson)?;
        let slot = self.lessons.get_mut(index).ok_or_else(|| {
            ValidationError::new(format!("Lesson index {} out of range", index))
        })?;
        *slot = lesson;
        Ok(())
    }

    /// Remove the lesson at `index` (0..count); the last lesson cannot be removed.
    pub fn remove_lesson(&mut self, index: usize) -> Result<String, ValidationError> {
        if index >= self.lessons.len() {
            return Err(ValidationError::new(format!(
                "Lesson index {} out of range",
                index
            )));
        }
        if self.lessons.len() == 1 {
            return Err(ValidationError::new(
                "A week must keep at least one lesson",
            ));
        }
        Ok(self.lessons.remove(index))
    }
}

/// A learning curriculum owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Curriculum {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub visibility: Visibility,
    pub week_schedules: Vec<WeekSchedule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Curriculum {
    /// Create a new curriculum, rejecting duplicate week numbers.
    pub fn new(
        owner_id: &str,
        title: Title,
        visibility: Visibility,
        mut week_schedules: Vec<WeekSchedule>,
    ) -> Result<Self, ValidationError> {
        week_schedules.sort_by_key(|w| w.week_number);
        if week_schedules
            .windows(2)
            .any(|pair| pair[0].week_number == pair[1].week_number)
        {
            return Err(ValidationError::new("Duplicate week numbers are not allowed"));
        }
        let now = Utc::now();
        Ok(Self {
            id: new_id(),
            owner_id: owner_id.to_string(),
            title: title.into_inner(),
            visibility,
            week_schedules,
            created_at: now,
            updated_at: now,
        })
    }

    /// Admins and owners see everything; others only public curricula.
    pub fn can_view(&self, user_id: &str, is_admin: bool) -> bool {
        is_admin || self.owner_id == user_id || self.visibility == Visibility::Public
    }

    pub fn can_modify(&self, user_id: &str, is_admin: bool) -> bool {
        is_admin || self.owner_id == user_id
    }

    pub fn week(&self, week_number: i64) -> Option<&WeekSchedule> {
        self.week_schedules
            .iter()
            .find(|w| w.week_number == week_number)
    }

    pub fn week_mut(&mut self, week_number: i64) -> Option<&mut WeekSchedule> {
        self.week_schedules
            .iter_mut()
            .find(|w| w.week_number == week_number)
    }

    pub fn total_weeks(&self) -> usize {
        self.week_schedules.len()
    }

    pub fn total_lessons(&self) -> usize {
        self.week_schedules.iter().map(WeekSchedule::lesson_count).sum()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Insert `week` at its number, pushing that week and every later one back
    /// by one. A week pushed past week 24 is dropped.
    pub fn insert_week_and_shift(&mut self, week: WeekSchedule) {
        let at = week.week_number;
        let mut shifted: Vec<WeekSchedule> = Vec::with_capacity(self.week_schedules.len() + 1);
        for mut existing in self.week_schedules.drain(..) {
            if existing.week_number >= at {
                if existing.week_number >= MAX_WEEKS {
                    continue;
                }
                existing.week_number += 1;
            }
            shifted.push(existing);
        }
        shifted.push(week);
        shifted.sort_by_key(|w| w.week_number);
        self.week_schedules = shifted;
        self.touch();
    }

    /// Remove a week and pull every later week forward by one.
    ///
    /// Returns `false` when the week does not exist.
    pub fn remove_week_and_shift(&mut self, week_number: i64) -> bool {
        let before = self.week_schedules.len();
        self.week_schedules.retain(|w| w.week_number != week_number);
        if self.week_schedules.len() == before {
            return false;
        }
        for week in self.week_schedules.iter_mut() {
            if week.week_number > week_number {
                week.week_number -= 1;
            }
        }
        self.touch();
        true
    }
}

/// List entry for a curriculum, without the weekly content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurriculumSummary {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub visibility: Visibility,
    pub total_weeks: usize,
    pub total_lessons: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Curriculum> for CurriculumSummary {
    fn from(c: &Curriculum) -> Self {
        Self {
            id: c.id.clone(),
            owner_id: c.owner_id.clone(),
            title: c.title.clone(),
            visibility: c.visibility,
            total_weeks: c.total_weeks(),
            total_lessons: c.total_lessons(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}
