//! Learning statistics
//!
//! Everything here is derived from the caller's summaries and the feedbacks
//! on them; nothing is stored. The calendar math works on UTC dates.

use crate::db::repositories::{CurriculumRepository, FeedbackRepository, SummaryRepository};
use crate::models::{Feedback, FeedbackGrade, Summary, User, ValidationError};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

pub const DEFAULT_STATS_DAYS: i64 = 30;
pub const MIN_STATS_DAYS: i64 = 7;
pub const MAX_STATS_DAYS: i64 = 365;

const RECENT_ACTIVITY_LIMIT: usize = 10;
const MONTHS_OF_PROGRESS: u32 = 6;
/// Learning days per week that count as meeting the weekly goal
const WEEKLY_GOAL_DAYS: f64 = 3.0;
const DESCRIPTION_SNIPPET: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum StatsServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ValidationError> for StatsServiceError {
    fn from(e: ValidationError) -> Self {
        StatsServiceError::ValidationError(e.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreakInfo {
    pub current_streak: i64,
    pub longest_streak: i64,
    pub total_learning_days: i64,
    pub last_learning_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreDistribution {
    pub grade_counts: BTreeMap<String, i64>,
    pub average: f64,
    pub highest: Option<f64>,
    pub lowest: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurriculumProgress {
    pub curriculum_id: String,
    pub title: String,
    pub total_weeks: usize,
    pub summaries_count: usize,
    pub feedbacks_count: usize,
    pub completion_rate: f64,
    pub feedback_rate: f64,
    pub average_score: Option<f64>,
    pub last_activity_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Summary,
    Feedback,
}

#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    pub kind: ActivityKind,
    pub id: String,
    pub curriculum_id: String,
    pub week_number: i64,
    pub description: String,
    pub score: Option<f64>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyProgress {
    /// `YYYY-MM`
    pub month: String,
    pub summaries: usize,
    pub feedbacks: usize,
    pub average_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LearningStats {
    pub user_id: String,
    pub period_days: i64,
    pub total_summaries: usize,
    pub total_feedbacks: usize,
    pub average_score: f64,
    pub streak: StreakInfo,
    pub score_distribution: ScoreDistribution,
    pub curriculum_progress: Vec<CurriculumProgress>,
    pub recent_activities: Vec<Activity>,
    pub monthly_progress: Vec<MonthlyProgress>,
    pub weekly_goal_achievement: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean(scores: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        None
    } else {
        Some(round2(scores.iter().sum::<f64>() / scores.len() as f64))
    }
}

/// Streaks over a set of learning days.
///
/// The current streak counts back from today, or from yesterday when nothing
/// was learned today yet. The longest streak only considers the last 365 days.
pub fn compute_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> StreakInfo {
    let has = |d: NaiveDate| days.contains(&d);

    let mut current = 0;
    let mut cursor = if has(today) { Some(today) } else { today.pred_opt() };
    while let Some(day) = cursor.filter(|d| has(*d)) {
        current += 1;
        cursor = day.pred_opt();
    }

    let window_start = today - Duration::days(MAX_STATS_DAYS - 1);
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in days.range(window_start..=today) {
        run = match previous {
            Some(p) if p.succ_opt() == Some(*day) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*day);
    }

    StreakInfo {
        current_streak: current,
        longest_streak: longest.max(current),
        total_learning_days: days.len() as i64,
        last_learning_date: days.iter().next_back().copied(),
    }
}

/// Share of the weekly goal (three learning days a week) met over `period_days`
pub fn weekly_goal_achievement(learning_days: usize, period_days: i64) -> f64 {
    let goal = period_days as f64 / 7.0 * WEEKLY_GOAL_DAYS;
    if goal <= 0.0 {
        return 0.0;
    }
    round2((learning_days as f64 / goal * 100.0).min(100.0))
}

fn grade_distribution(scores: &[f64]) -> ScoreDistribution {
    let mut grade_counts: BTreeMap<String, i64> = FeedbackGrade::ALL
        .iter()
        .map(|g| (g.as_str().to_string(), 0))
        .collect();
    for score in scores {
        *grade_counts
            .entry(FeedbackGrade::from_score(*score).as_str().to_string())
            .or_default() += 1;
    }
    ScoreDistribution {
        grade_counts,
        average: mean(scores).unwrap_or(0.0),
        highest: scores.iter().copied().reduce(f64::max),
        lowest: scores.iter().copied().reduce(f64::min),
    }
}

/// First day of the month `back` months before the month of `today`
fn month_start(today: NaiveDate, back: u32) -> Option<NaiveDate> {
    let months = today.year() * 12 + today.month0() as i32 - back as i32;
    NaiveDate::from_ymd_opt(months.div_euclid(12), months.rem_euclid(12) as u32 + 1, 1)
}

pub struct StatsService {
    summary_repo: Arc<dyn SummaryRepository>,
    feedback_repo: Arc<dyn FeedbackRepository>,
    curriculum_repo: Arc<dyn CurriculumRepository>,
}

impl StatsService {
    pub fn new(
        summary_repo: Arc<dyn SummaryRepository>,
        feedback_repo: Arc<dyn FeedbackRepository>,
        curriculum_repo: Arc<dyn CurriculumRepository>,
    ) -> Self {
        Self {
            summary_repo,
            feedback_repo,
            curriculum_repo,
        }
    }

    pub async fn learning_stats(&self, user: &User, days: i64) -> Result<LearningStats, StatsServiceError> {
        self.learning_stats_at(user, days, Utc::now()).await
    }

    async fn learning_stats_at(
        &self,
        user: &User,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<LearningStats, StatsServiceError> {
        if !(MIN_STATS_DAYS..=MAX_STATS_DAYS).contains(&days) {
            return Err(ValidationError::new(format!(
                "days must be between {} and {}",
                MIN_STATS_DAYS, MAX_STATS_DAYS
            ))
            .into());
        }

        let summaries = self.summary_repo.list_all_by_owner(&user.id).await?;
        let feedbacks = self.feedback_repo.list_all_by_owner(&user.id).await?;
        let today = now.date_naive();
        let since = now - Duration::days(days);

        let all_days: BTreeSet<NaiveDate> = summaries.iter().map(|s| s.created_at.date_naive()).collect();
        let streak = compute_streak(&all_days, today);

        let summary_by_id: HashMap<&str, &Summary> =
            summaries.iter().map(|s| (s.id.as_str(), s)).collect();
        let recent_summaries: Vec<&Summary> =
            summaries.iter().filter(|s| s.created_at >= since).collect();
        let recent_feedbacks: Vec<&Feedback> =
            feedbacks.iter().filter(|f| f.created_at >= since).collect();
        let recent_scores: Vec<f64> = recent_feedbacks.iter().map(|f| f.score).collect();

        let period_days: BTreeSet<NaiveDate> =
            recent_summaries.iter().map(|s| s.created_at.date_naive()).collect();

        let curriculum_progress = self
            .curriculum_progress(&recent_summaries, &recent_feedbacks, &summary_by_id)
            .await?;

        Ok(LearningStats {
            user_id: user.id.clone(),
            period_days: days,
            total_summaries: recent_summaries.len(),
            total_feedbacks: recent_feedbacks.len(),
            average_score: mean(&recent_scores).unwrap_or(0.0),
            streak,
            score_distribution: grade_distribution(&recent_scores),
            curriculum_progress,
            recent_activities: recent_activities(&recent_summaries, &recent_feedbacks, &summary_by_id),
            monthly_progress: monthly_progress(&summaries, &feedbacks, today),
            weekly_goal_achievement: weekly_goal_achievement(period_days.len(), days),
        })
    }

    async fn curriculum_progress(
        &self,
        summaries: &[&Summary],
        feedbacks: &[&Feedback],
        summary_by_id: &HashMap<&str, &Summary>,
    ) -> Result<Vec<CurriculumProgress>, StatsServiceError> {
        #[derive(Default)]
        struct Acc {
            summaries: usize,
            scores: Vec<f64>,
            last: Option<DateTime<Utc>>,
        }

        let mut per_curriculum: HashMap<&str, Acc> = HashMap::new();
        for s in summaries {
            let acc = per_curriculum.entry(s.curriculum_id.as_str()).or_default();
            acc.summaries += 1;
            acc.last = acc.last.max(Some(s.updated_at));
        }
        for f in feedbacks {
            if let Some(s) = summary_by_id.get(f.summary_id.as_str()) {
                let acc = per_curriculum.entry(s.curriculum_id.as_str()).or_default();
                acc.scores.push(f.score);
                acc.last = acc.last.max(Some(f.created_at));
            }
        }

        let ids: Vec<String> = per_curriculum.keys().map(|id| id.to_string()).collect();
        let curricula = self.curriculum_repo.get_by_ids(&ids).await?;

        let mut progress: Vec<CurriculumProgress> = curricula
            .iter()
            .filter_map(|c| {
                let acc = per_curriculum.get(c.id.as_str())?;
                let total_weeks = c.total_weeks();
                let completion = if total_weeks == 0 {
                    0.0
                } else {
                    (acc.summaries as f64 / total_weeks as f64 * 100.0).min(100.0)
                };
                let feedback_rate = if acc.summaries == 0 {
                    0.0
                } else {
                    acc.scores.len() as f64 / acc.summaries as f64 * 100.0
                };
                Some(CurriculumProgress {
                    curriculum_id: c.id.clone(),
                    title: c.title.clone(),
                    total_weeks,
                    summaries_count: acc.summaries,
                    feedbacks_count: acc.scores.len(),
                    completion_rate: round2(completion),
                    feedback_rate: round2(feedback_rate),
                    average_score: mean(&acc.scores),
                    last_activity_at: acc.last.unwrap_or(c.updated_at),
                })
            })
            .collect();
        progress.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        Ok(progress)
    }
}

fn recent_activities(
    summaries: &[&Summary],
    feedbacks: &[&Feedback],
    summary_by_id: &HashMap<&str, &Summary>,
) -> Vec<Activity> {
    let mut activities: Vec<Activity> = summaries
        .iter()
        .map(|s| Activity {
            kind: ActivityKind::Summary,
            id: s.id.clone(),
            curriculum_id: s.curriculum_id.clone(),
            week_number: s.week_number,
            description: crate::models::snippet(&s.content, DESCRIPTION_SNIPPET),
            score: None,
            occurred_at: s.created_at,
        })
        .collect();
    activities.extend(feedbacks.iter().filter_map(|f| {
        let s = summary_by_id.get(f.summary_id.as_str())?;
        Some(Activity {
            kind: ActivityKind::Feedback,
            id: f.id.clone(),
            curriculum_id: s.curriculum_id.clone(),
            week_number: s.week_number,
            description: format!("Feedback {} ({})", FeedbackGrade::from_score(f.score), f.score),
            score: Some(f.score),
            occurred_at: f.created_at,
        })
    }));
    activities.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    activities.truncate(RECENT_ACTIVITY_LIMIT);
    activities
}

/// Counts for the current month and the five before it, oldest first
fn monthly_progress(summaries: &[Summary], feedbacks: &[Feedback], today: NaiveDate) -> Vec<MonthlyProgress> {
    let key = |at: DateTime<Utc>| at.format("%Y-%m").to_string();
    (0..MONTHS_OF_PROGRESS)
        .rev()
        .filter_map(|back| month_start(today, back))
        .map(|start| {
            let month = start.format("%Y-%m").to_string();
            let scores: Vec<f64> = feedbacks
                .iter()
                .filter(|f| key(f.created_at) == month)
                .map(|f| f.score)
                .collect();
            MonthlyProgress {
                summaries: summaries.iter().filter(|s| key(s.created_at) == month).count(),
                feedbacks: scores.len(),
                average_score: mean(&scores),
                month,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_curriculum, insert_user, setup_pool};
    use crate::db::repositories::{SqlxCurriculumRepository, SqlxFeedbackRepository, SqlxSummaryRepository};
    use crate::models::{SummaryContent, Visibility};
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_streak_counts_from_today_or_yesterday() {
        let today = date(2024, 5, 10);
        let days: BTreeSet<_> = [date(2024, 5, 8), date(2024, 5, 9), date(2024, 5, 10)].into();
        assert_eq!(compute_streak(&days, today).current_streak, 3);

        let days: BTreeSet<_> = [date(2024, 5, 8), date(2024, 5, 9)].into();
        assert_eq!(compute_streak(&days, today).current_streak, 2);

        let days: BTreeSet<_> = [date(2024, 5, 7), date(2024, 5, 8)].into();
        let streak = compute_streak(&days, today);
        assert_eq!(streak.current_streak, 0);
        assert_eq!(streak.longest_streak, 2);
        assert_eq!(streak.last_learning_date, Some(date(2024, 5, 8)));
    }

    #[test]
    fn test_longest_streak_ignores_days_older_than_a_year() {
        let today = date(2024, 5, 10);
        let mut days: BTreeSet<NaiveDate> = (0..5).map(|i| date(2022, 1, 1) + Duration::days(i)).collect();
        days.insert(date(2024, 5, 1));
        let streak = compute_streak(&days, today);
        assert_eq!(streak.longest_streak, 1);
        assert_eq!(streak.total_learning_days, 6);
    }

    #[test]
    fn test_weekly_goal_achievement() {
        assert_eq!(weekly_goal_achievement(0, 7), 0.0);
        assert_eq!(weekly_goal_achievement(3, 7), 100.0);
        assert_eq!(weekly_goal_achievement(6, 28), 50.0);
        assert_eq!(weekly_goal_achievement(30, 7), 100.0);
    }

    #[test]
    fn test_grade_distribution_lists_every_grade() {
        let dist = grade_distribution(&[9.5, 8.0, 3.0]);
        assert_eq!(dist.grade_counts.len(), 7);
        assert_eq!(dist.grade_counts["A+"], 1);
        assert_eq!(dist.grade_counts["A"], 1);
        assert_eq!(dist.grade_counts["D"], 1);
        assert_eq!(dist.highest, Some(9.5));
        assert_eq!(dist.lowest, Some(3.0));
        assert_eq!(dist.average, 6.83);
    }

    #[test]
    fn test_month_start_crosses_year_boundary() {
        assert_eq!(month_start(date(2024, 2, 15), 3), Some(date(2023, 11, 1)));
        assert_eq!(month_start(date(2024, 2, 15), 0), Some(date(2024, 2, 1)));
    }

    #[tokio::test]
    async fn test_learning_stats_end_to_end() {
        let pool = setup_pool().await;
        let summaries = SqlxSummaryRepository::new(pool.clone());
        let feedbacks = SqlxFeedbackRepository::new(pool.clone());
        let service = StatsService::new(
            SqlxSummaryRepository::boxed(pool.clone()),
            SqlxFeedbackRepository::boxed(pool.clone()),
            SqlxCurriculumRepository::boxed(pool.clone()),
        );
        let alice = insert_user(&pool, "alice").await;
        let c = insert_curriculum(&pool, &alice, "Rust basics", Visibility::Private, 4).await;

        let content = "Ownership means each value has exactly one owner at a time. ".repeat(2);
        for week in 1..=2 {
            let s = Summary::new(&c.id, week, &alice.id, SummaryContent::parse(&content).unwrap());
            summaries.create(&s).await.unwrap();
            if week == 1 {
                feedbacks.create(&Feedback::new(&s.id, "good", 8.0).unwrap()).await.unwrap();
            }
        }

        let stats = service.learning_stats(&alice, 30).await.unwrap();
        assert_eq!(stats.total_summaries, 2);
        assert_eq!(stats.total_feedbacks, 1);
        assert_eq!(stats.average_score, 8.0);
        assert_eq!(stats.streak.current_streak, 1);
        assert_eq!(stats.curriculum_progress.len(), 1);
        let progress = &stats.curriculum_progress[0];
        assert_eq!(progress.completion_rate, 50.0);
        assert_eq!(progress.feedback_rate, 50.0);
        assert_eq!(stats.recent_activities.len(), 3);
        assert_eq!(stats.monthly_progress.len(), 6);
        assert_eq!(stats.monthly_progress[5].summaries, 2);

        assert!(matches!(
            service.learning_stats(&alice, 3).await,
            Err(StatsServiceError::ValidationError(_))
        ));
    }

    proptest! {
        #[test]
        fn streak_bounds_hold(offsets in proptest::collection::btree_set(0i64..400, 0..60)) {
            let today = date(2024, 6, 1);
            let days: BTreeSet<NaiveDate> = offsets.iter().map(|o| today - Duration::days(*o)).collect();
            let streak = compute_streak(&days, today);
            prop_assert!(streak.current_streak <= streak.longest_streak);
            prop_assert!(streak.longest_streak <= streak.total_learning_days);
            prop_assert_eq!(streak.total_learning_days as usize, days.len());
        }

        #[test]
        fn goal_achievement_is_a_percentage(learning_days in 0usize..400, period in 7i64..=365) {
            let value = weekly_goal_achievement(learning_days, period);
            prop_assert!((0.0..=100.0).contains(&value));
        }
    }
}
