//! Database repositories
//!
//! One repository trait per aggregate, each with an SQLx implementation that
//! runs on both SQLite and MySQL.

/// A value bound into a query whose filter is assembled at runtime
pub(crate) enum Arg<'a> {
    Text(&'a str),
    Int(i64),
    Float(f64),
}

/// Bind every [`Arg`] in order onto a sqlx query.
macro_rules! bind_args {
    ($query:expr, $args:expr) => {{
        let mut query = $query;
        for arg in $args {
            query = match arg {
                $crate::db::repositories::Arg::Text(v) => query.bind(*v),
                $crate::db::repositories::Arg::Int(v) => query.bind(*v),
                $crate::db::repositories::Arg::Float(v) => query.bind(*v),
            };
        }
        query
    }};
}

/// Restrict `curriculums` aliased `c` to rows `viewer` may see.
///
/// `None` means an admin and matches everything.
pub(crate) fn viewable_filter<'a>(viewer: Option<&'a str>, args: &mut Vec<Arg<'a>>) -> &'static str {
    match viewer {
        Some(user_id) => {
            args.push(Arg::Text(user_id));
            "(c.visibility = 'PUBLIC' OR c.owner_id = ?)"
        }
        None => "1 = 1",
    }
}

/// Escape `%`, `_` and `!` for a `LIKE ... ESCAPE '!'` pattern
pub(crate) fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '!') {
            escaped.push('!');
        }
        escaped.push(ch);
    }
    escaped
}

pub mod category;
pub mod comment;
pub mod curriculum;
pub mod engagement;
pub mod feed;
pub mod feedback;
pub mod follow;
pub mod summary;
pub mod tag;
pub mod user;

#[cfg(test)]
pub(crate) mod test_support;

pub use category::{CategoryRepository, CategoryWithUsage, SqlxCategoryRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use curriculum::{CurriculumRepository, SqlxCurriculumRepository};
pub use engagement::{
    BookmarkRepository, LikeRepository, SqlxBookmarkRepository, SqlxLikeRepository,
};
pub use feed::{FeedRepository, SqlxFeedRepository};
pub use feedback::{FeedbackRepository, SqlxFeedbackRepository};
pub use follow::{FollowRepository, FollowUser, SqlxFollowRepository, SuggestedUser};
pub use summary::{SqlxSummaryRepository, SummaryRepository};
pub use tag::{SqlxTagRepository, TagCounts, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};
