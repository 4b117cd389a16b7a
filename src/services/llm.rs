//! LLM client
//!
//! Curriculum and feedback generation through an OpenAI compatible chat
//! completions endpoint. Responses are free-form JSON; the parsers in this
//! module turn them into validated domain values and tolerate the shapes
//! models commonly produce.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::models::{Difficulty, Feedback, Title, WeekSchedule, MAX_LESSONS_PER_WEEK, MAX_LESSON_LENGTH};

const TEMPERATURE: f64 = 0.3;
const MAX_TOKENS: u32 = 1200;

const CURRICULUM_ROLE: &str = "You are a curriculum generator. \
    Output only valid JSON: an object with `title` (string) and `schedule` \
    (array of objects with `week_number` (int) and `lessons` (list of strings)). \
    No markdown, no explanations. For computer science goals, follow the OSSU curriculum.";

const FEEDBACK_ROLE: &str = "You are a learning feedback generator. \
    Output only valid JSON with exactly `comment` (string) and `score` (number 0-10). \
    No other keys or markdown.";

static WEEK_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+\s*주차\s*[:：\-]\s*").expect("valid week prefix regex"));

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Transport or provider failure
    #[error("LLM request failed: {0}")]
    Request(String),

    /// The provider answered with something we cannot use
    #[error("Invalid LLM response: {0}")]
    InvalidResponse(String),
}

/// Text generation backend
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate_curriculum(
        &self,
        goal: &str,
        period: i64,
        difficulty: Difficulty,
        details: &str,
    ) -> Result<Value, LlmError>;

    async fn generate_feedback(&self, lessons: &[String], summary: &str) -> Result<Value, LlmError>;
}

/// `LlmClient` backed by a chat completions API
pub struct OpenAiClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;
        Ok(Self { http, config })
    }

    async fn complete(&self, role: &str, prompt: String, timeout: Duration) -> Result<Value, LlmError> {
        let payload = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": role },
                { "role": "user", "content": prompt },
            ],
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
        });

        let response: Value = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| LlmError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let content = response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| LlmError::InvalidResponse("missing message content".to_string()))?;
        parse_json_content(content)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate_curriculum(
        &self,
        goal: &str,
        period: i64,
        difficulty: Difficulty,
        details: &str,
    ) -> Result<Value, LlmError> {
        let prompt = format!(
            "Goal: {goal}\nPeriod (weeks): {period}\nDifficulty: {difficulty}\nDetails: {details}\n\
             Each week must have between 1 and 5 lessons. Keep lessons practical and concrete.\n\
             Respond with JSON only:\n\
             {{\"title\": \"<curriculum title>\", \"schedule\": [{{\"week_number\": 1, \"lessons\": [\"...\"]}}, \
             ..., {{\"week_number\": {period}, \"lessons\": [\"...\"]}}]}}"
        );
        tracing::debug!(goal, period, "Requesting curriculum generation");
        self.complete(
            CURRICULUM_ROLE,
            prompt,
            Duration::from_secs(self.config.timeout_seconds),
        )
        .await
    }

    async fn generate_feedback(&self, lessons: &[String], summary: &str) -> Result<Value, LlmError> {
        let prompt = format!(
            "Topics: {}\nLearner summary: {}\n\
             Give constructive, specific feedback on the summary as JSON:\n\
             {{\"comment\": \"<feedback>\", \"score\": 8.5}}\n\
             score must be between 0.0 and 10.0.",
            lessons.join(", "),
            summary
        );
        self.complete(
            FEEDBACK_ROLE,
            prompt,
            Duration::from_secs(self.config.feedback_timeout_seconds),
        )
        .await
    }
}

/// Drop surrounding Markdown code fences (```json ... ```)
pub fn strip_code_fences(text: &str) -> &str {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest.strip_prefix("json").unwrap_or(rest);
    }
    if let Some(rest) = cleaned.trim_end().strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}

pub fn parse_json_content(text: &str) -> Result<Value, LlmError> {
    serde_json::from_str(strip_code_fences(text)).map_err(|e| {
        tracing::warn!(error = %e, "LLM returned unparseable JSON");
        LlmError::InvalidResponse(e.to_string())
    })
}

/// Curriculum draft extracted from a generation response
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCurriculum {
    pub title: Option<String>,
    pub weeks: Vec<WeekSchedule>,
}

/// Parse a generation response.
///
/// Accepts `{title, schedule}`, a list whose first element has `schedule`,
/// or a bare list of week entries. Unusable entries are skipped; the first
/// occurrence of a week number wins.
pub fn parse_curriculum(value: &Value) -> Result<GeneratedCurriculum, LlmError> {
    let (title, schedule) = match value {
        Value::Object(map) => (
            map.get("title"),
            map.get("schedule").and_then(Value::as_array),
        ),
        Value::Array(items) => match items.first() {
            Some(first) if first.get("schedule").is_some() => (
                first.get("title"),
                first.get("schedule").and_then(Value::as_array),
            ),
            _ => (None, Some(items)),
        },
        _ => (None, None),
    };
    let schedule =
        schedule.ok_or_else(|| LlmError::InvalidResponse("no schedule in response".to_string()))?;

    let mut seen = HashSet::new();
    let mut weeks = Vec::new();
    for entry in schedule {
        match parse_week_entry(entry) {
            Some(week) => {
                if seen.insert(week.week_number) {
                    weeks.push(week);
                }
            }
            None => tracing::warn!(entry = %entry, "Skipping invalid week entry"),
        }
    }
    if weeks.is_empty() {
        return Err(LlmError::InvalidResponse(
            "response contained no valid weeks".to_string(),
        ));
    }
    weeks.sort_by_key(|w| w.week_number);

    let title = title
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    Ok(GeneratedCurriculum { title, weeks })
}

fn parse_week_entry(entry: &Value) -> Option<WeekSchedule> {
    let number = ["week_number", "weekNumber", "week"]
        .iter()
        .find_map(|key| entry.get(*key))
        .and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })?;

    let title = ["title", "week_title"]
        .iter()
        .find_map(|key| entry.get(*key).and_then(Value::as_str))
        .and_then(|t| Title::truncated(&WEEK_PREFIX.replace(t, "")).ok())
        .map(Title::into_inner);

    let lessons = ["lessons", "topics", "content"]
        .iter()
        .find_map(|key| entry.get(*key))
        .and_then(|v| match v {
            Value::String(s) => Some(vec![s.as_str()]),
            Value::Array(items) => Some(items.iter().filter_map(Value::as_str).collect()),
            _ => None,
        })?
        .into_iter()
        .map(fit_lesson)
        .filter(|l| !l.is_empty())
        .take(MAX_LESSONS_PER_WEEK)
        .collect();

    WeekSchedule::new(number, title.as_deref(), lessons).ok()
}

/// Trim and cut a generated lesson to the lesson length limit
fn fit_lesson(raw: &str) -> String {
    raw.trim().chars().take(MAX_LESSON_LENGTH).collect()
}

/// Feedback extracted from a generation response
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFeedback {
    pub comment: String,
    pub score: f64,
}

/// Parse `{comment, score}`, clamping the score into 0..=10
pub fn parse_feedback(value: &Value) -> Result<GeneratedFeedback, LlmError> {
    let comment = value
        .get("comment")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| LlmError::InvalidResponse("feedback comment missing".to_string()))?;
    let score = value
        .get("score")
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .filter(|s| s.is_finite())
        .ok_or_else(|| LlmError::InvalidResponse("feedback score missing".to_string()))?;

    Ok(GeneratedFeedback {
        comment: comment.to_string(),
        score: score.clamp(Feedback::MIN_SCORE, Feedback::MAX_SCORE),
    })
}

#[cfg(test)]
pub(crate) mod fake {
    //! Deterministic `LlmClient` for service and API tests

    use super::*;
    use std::sync::Mutex;

    pub struct FakeLlm {
        pub curriculum: Mutex<Result<Value, String>>,
        pub feedback: Mutex<Result<Value, String>>,
    }

    impl FakeLlm {
        pub fn new() -> Self {
            Self {
                curriculum: Mutex::new(Ok(json!({
                    "title": "Learn Rust",
                    "schedule": [
                        { "week_number": 1, "lessons": ["Ownership", "Borrowing"] },
                        { "week_number": 2, "lessons": ["Traits"] },
                    ]
                }))),
                feedback: Mutex::new(Ok(json!({ "comment": "Clear and complete.", "score": 8.5 }))),
            }
        }

        pub fn failing() -> Self {
            let llm = Self::new();
            *llm.curriculum.lock().unwrap() = Err("connection refused".to_string());
            *llm.feedback.lock().unwrap() = Err("connection refused".to_string());
            llm
        }
    }

    #[async_trait]
    impl LlmClient for FakeLlm {
        async fn generate_curriculum(
            &self,
            _goal: &str,
            _period: i64,
            _difficulty: Difficulty,
            _details: &str,
        ) -> Result<Value, LlmError> {
            self.curriculum.lock().unwrap().clone().map_err(LlmError::Request)
        }

        async fn generate_feedback(&self, _lessons: &[String], _summary: &str) -> Result<Value, LlmError> {
            self.feedback.lock().unwrap().clone().map_err(LlmError::Request)
        }
    }
}
