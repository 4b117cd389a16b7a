//! Prometheus metrics
//!
//! Business event counters are bumped by the services after a successful
//! write. Totals are gauges refreshed from the database by
//! [`collect_gauges`], and HTTP traffic is recorded by [`track_requests`].
//! Everything lives in one registry rendered by [`render`].

use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::db::DynDatabasePool;
use crate::with_pool;

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for counter in EVENTS.iter() {
        registry.register(Box::new(counter.counter.clone())).ok();
    }
    for gauge in TOTALS.iter() {
        registry.register(Box::new(gauge.gauge.clone())).ok();
    }
    registry.register(Box::new(REQUESTS.clone())).ok();
    registry.register(Box::new(REQUEST_LATENCY.clone())).ok();
    registry
});

/// A business event worth counting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    UserRegistration,
    CurriculumCreation,
    SummaryCreation,
    FeedbackCreation,
    TagCreation,
    CurriculumTagAssignment,
    CurriculumCategoryAssignment,
    LikeCreation,
    BookmarkCreation,
    CommentCreation,
    FollowCreation,
}

impl Event {
    const ALL: [Event; 11] = [
        Event::UserRegistration,
        Event::CurriculumCreation,
        Event::SummaryCreation,
        Event::FeedbackCreation,
        Event::TagCreation,
        Event::CurriculumTagAssignment,
        Event::CurriculumCategoryAssignment,
        Event::LikeCreation,
        Event::BookmarkCreation,
        Event::CommentCreation,
        Event::FollowCreation,
    ];

    fn name_and_help(self) -> (&'static str, &'static str) {
        match self {
            Event::UserRegistration => ("user_registrations_total", "Total number of user registrations"),
            Event::CurriculumCreation => ("curriculum_creations_total", "Total number of curriculum creations"),
            Event::SummaryCreation => ("summary_creations_total", "Total number of summary creations"),
            Event::FeedbackCreation => ("feedback_creations_total", "Total number of feedback creations"),
            Event::TagCreation => ("tag_creations_total", "Total number of tag creations"),
            Event::CurriculumTagAssignment => (
                "curriculum_tag_assignments_total",
                "Total number of curriculum-tag assignments",
            ),
            Event::CurriculumCategoryAssignment => (
                "curriculum_category_assignments_total",
                "Total number of curriculum-category assignments",
            ),
            Event::LikeCreation => ("like_creations_total", "Total number of like creations"),
            Event::BookmarkCreation => ("bookmark_creations_total", "Total number of bookmark creations"),
            Event::CommentCreation => ("comment_creations_total", "Total number of comment creations"),
            Event::FollowCreation => ("follow_creations_total", "Total number of follow creations"),
        }
    }
}

struct EventCounter {
    event: Event,
    counter: IntCounter,
}

static EVENTS: Lazy<Vec<EventCounter>> = Lazy::new(|| {
    Event::ALL
        .iter()
        .map(|&event| {
            let (name, help) = event.name_and_help();
            EventCounter {
                event,
                counter: IntCounter::new(name, help).expect("valid counter"),
            }
        })
        .collect()
});

struct TotalGauge {
    name: &'static str,
    gauge: IntGauge,
}

/// `(gauge name, help, count query)` for every database total
const TOTAL_QUERIES: &[(&str, &str, &str)] = &[
    ("total_users", "Total number of users in the system", "SELECT COUNT(*) FROM users"),
    ("total_curriculums", "Total number of curriculums in the system", "SELECT COUNT(*) FROM curriculums"),
    (
        "public_curriculums",
        "Number of public curriculums",
        "SELECT COUNT(*) FROM curriculums WHERE visibility = 'PUBLIC'",
    ),
    (
        "private_curriculums",
        "Number of private curriculums",
        "SELECT COUNT(*) FROM curriculums WHERE visibility = 'PRIVATE'",
    ),
    ("total_summaries", "Total number of summaries in the system", "SELECT COUNT(*) FROM summaries"),
    ("total_feedbacks", "Total number of feedbacks in the system", "SELECT COUNT(*) FROM feedbacks"),
    ("total_tags", "Total number of tags in the system", "SELECT COUNT(*) FROM tags"),
    (
        "popular_tags",
        "Number of popular tags (usage_count >= 10)",
        "SELECT COUNT(*) FROM tags WHERE usage_count >= 10",
    ),
    ("total_categories", "Total number of categories in the system", "SELECT COUNT(*) FROM categories"),
    (
        "active_categories",
        "Number of active categories",
        "SELECT COUNT(*) FROM categories WHERE is_active = 1",
    ),
    ("total_likes", "Total number of likes in the system", "SELECT COUNT(*) FROM likes"),
    ("total_bookmarks", "Total number of bookmarks in the system", "SELECT COUNT(*) FROM bookmarks"),
    ("total_comments", "Total number of comments in the system", "SELECT COUNT(*) FROM comments"),
    ("total_follows", "Total number of follow relationships in the system", "SELECT COUNT(*) FROM follows"),
];

static TOTALS: Lazy<Vec<TotalGauge>> = Lazy::new(|| {
    TOTAL_QUERIES
        .iter()
        .map(|&(name, help, _)| TotalGauge {
            name,
            gauge: IntGauge::new(name, help).expect("valid gauge"),
        })
        .collect()
});

static REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("api_request_total", "Total number of API requests");
    IntCounterVec::new(opts, &["method", "endpoint", "status_code"]).expect("counter vec")
});

static REQUEST_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    let opts = HistogramOpts::new("api_request_duration_seconds", "API request execution time")
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]);
    HistogramVec::new(opts, &["method", "endpoint"]).expect("histogram vec")
});

/// Count one occurrence of `event`
pub fn record(event: Event) {
    Lazy::force(&REGISTRY);
    if let Some(entry) = EVENTS.iter().find(|c| c.event == event) {
        entry.counter.inc();
    }
}

/// Current value of the counter behind `event`
pub fn event_count(event: Event) -> u64 {
    EVENTS
        .iter()
        .find(|c| c.event == event)
        .map(|c| c.counter.get())
        .unwrap_or(0)
}

/// Count every database total, in gauge order
pub async fn read_totals(pool: &DynDatabasePool) -> Result<Vec<(&'static str, i64)>> {
    let mut totals = Vec::with_capacity(TOTAL_QUERIES.len());
    for &(name, _, sql) in TOTAL_QUERIES {
        let count = with_pool!(pool, p => {
            let (count,): (i64,) = sqlx::query_as(sql)
                .fetch_one(p)
                .await
                .with_context(|| format!("Failed to count {}", name))?;
            count
        });
        totals.push((name, count));
    }
    Ok(totals)
}

/// Refresh every total gauge from the database
pub async fn collect_gauges(pool: &DynDatabasePool) -> Result<()> {
    Lazy::force(&REGISTRY);
    for (name, count) in read_totals(pool).await? {
        if let Some(total) = TOTALS.iter().find(|t| t.name == name) {
            total.gauge.set(count);
        }
    }
    Ok(())
}

/// Record method, matched route, status and latency of every request.
///
/// Requests that matched no route are labelled `unmatched`.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let response = next.run(request).await;

    Lazy::force(&REGISTRY);
    let status = response.status().as_u16().to_string();
    REQUESTS
        .with_label_values(&[method.as_str(), endpoint.as_str(), status.as_str()])
        .inc();
    REQUEST_LATENCY
        .with_label_values(&[method.as_str(), endpoint.as_str()])
        .observe(started.elapsed().as_secs_f64());
    response
}

/// Render the registry in the Prometheus text format
pub fn render() -> Result<String> {
    let mut buf = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buf)
        .context("Failed to encode metrics")?;
    String::from_utf8(buf).context("Metrics output is not UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_curriculum, insert_user, setup_pool};
    use crate::models::Visibility;

    #[test]
    fn test_record_increments_only_that_event() {
        let likes = event_count(Event::LikeCreation);
        let follows = event_count(Event::FollowCreation);

        record(Event::LikeCreation);
        record(Event::LikeCreation);

        assert!(event_count(Event::LikeCreation) >= likes + 2);
        assert_eq!(event_count(Event::FollowCreation), follows);
    }

    #[test]
    fn test_render_lists_every_event_counter() {
        record(Event::SummaryCreation);
        let out = render().unwrap();
        for event in Event::ALL {
            let (name, _) = event.name_and_help();
            assert!(out.contains(name), "missing {}", name);
        }
    }

    #[tokio::test]
    async fn test_read_totals_counts_rows() {
        let pool = setup_pool().await;
        let alice = insert_user(&pool, "alice").await;
        insert_curriculum(&pool, &alice, "Rust basics", Visibility::Public, 1).await;
        insert_curriculum(&pool, &alice, "Rust async", Visibility::Private, 1).await;

        let totals = read_totals(&pool).await.unwrap();
        let total = |name: &str| totals.iter().find(|(n, _)| *n == name).map(|(_, c)| *c);
        assert_eq!(totals.len(), TOTAL_QUERIES.len());
        assert_eq!(total("total_users"), Some(1));
        assert_eq!(total("total_curriculums"), Some(2));
        assert_eq!(total("public_curriculums"), Some(1));
        assert_eq!(total("private_curriculums"), Some(1));
        assert_eq!(total("total_summaries"), Some(0));

        collect_gauges(&pool).await.unwrap();
        assert!(render().unwrap().contains("# TYPE total_curriculums gauge"));
    }
}
