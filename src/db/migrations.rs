//! Database migrations module
//!
//! Migrations are embedded in the binary as SQL strings, one variant per
//! backend, and applied in version order. Applied versions are tracked in the
//! `_migrations` table so each runs exactly once.
//!
//! # Usage
//!
//! ```ignore
//! use curriculum_hub::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id VARCHAR(36) PRIMARY KEY,
                name VARCHAR(32) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(10) NOT NULL DEFAULT 'USER',
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_users_created_at ON users(created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id VARCHAR(36) PRIMARY KEY,
                name VARCHAR(32) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(10) NOT NULL DEFAULT 'USER',
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL
            );
            CREATE INDEX idx_users_created_at ON users(created_at);
        "#,
    },
    Migration {
        version: 2,
        name: "create_curriculums",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS curriculums (
                id VARCHAR(36) PRIMARY KEY,
                owner_id VARCHAR(36) NOT NULL,
                title VARCHAR(100) NOT NULL,
                visibility VARCHAR(10) NOT NULL DEFAULT 'PRIVATE',
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_curriculums_owner ON curriculums(owner_id);
            CREATE INDEX IF NOT EXISTS idx_curriculums_visibility ON curriculums(visibility, updated_at);
            CREATE TABLE IF NOT EXISTS week_schedules (
                curriculum_id VARCHAR(36) NOT NULL,
                week_number INTEGER NOT NULL,
                title VARCHAR(100) NOT NULL,
                lessons TEXT NOT NULL,
                PRIMARY KEY (curriculum_id, week_number),
                FOREIGN KEY (curriculum_id) REFERENCES curriculums(id) ON DELETE CASCADE
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS curriculums (
                id VARCHAR(36) PRIMARY KEY,
                owner_id VARCHAR(36) NOT NULL,
                title VARCHAR(100) NOT NULL,
                visibility VARCHAR(10) NOT NULL DEFAULT 'PRIVATE',
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_curriculums_owner ON curriculums(owner_id);
            CREATE INDEX idx_curriculums_visibility ON curriculums(visibility, updated_at);
            CREATE TABLE IF NOT EXISTS week_schedules (
                curriculum_id VARCHAR(36) NOT NULL,
                week_number BIGINT NOT NULL,
                title VARCHAR(100) NOT NULL,
                lessons TEXT NOT NULL,
                PRIMARY KEY (curriculum_id, week_number),
                FOREIGN KEY (curriculum_id) REFERENCES curriculums(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 3,
        name: "create_summaries_and_feedbacks",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS summaries (
                id VARCHAR(36) PRIMARY KEY,
                curriculum_id VARCHAR(36) NOT NULL,
                week_number INTEGER NOT NULL,
                owner_id VARCHAR(36) NOT NULL,
                content TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (curriculum_id) REFERENCES curriculums(id) ON DELETE CASCADE,
                FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_summaries_curriculum ON summaries(curriculum_id, week_number);
            CREATE INDEX IF NOT EXISTS idx_summaries_owner ON summaries(owner_id, created_at);
            CREATE TABLE IF NOT EXISTS feedbacks (
                id VARCHAR(36) PRIMARY KEY,
                summary_id VARCHAR(36) NOT NULL UNIQUE,
                comment TEXT NOT NULL,
                score REAL NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (summary_id) REFERENCES summaries(id) ON DELETE CASCADE
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS summaries (
                id VARCHAR(36) PRIMARY KEY,
                curriculum_id VARCHAR(36) NOT NULL,
                week_number BIGINT NOT NULL,
                owner_id VARCHAR(36) NOT NULL,
                content TEXT NOT NULL,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                FOREIGN KEY (curriculum_id) REFERENCES curriculums(id) ON DELETE CASCADE,
                FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_summaries_curriculum ON summaries(curriculum_id, week_number);
            CREATE INDEX idx_summaries_owner ON summaries(owner_id, created_at);
            CREATE TABLE IF NOT EXISTS feedbacks (
                id VARCHAR(36) PRIMARY KEY,
                summary_id VARCHAR(36) NOT NULL UNIQUE,
                comment TEXT NOT NULL,
                score DOUBLE NOT NULL,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                FOREIGN KEY (summary_id) REFERENCES summaries(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 4,
        name: "create_follows",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS follows (
                id VARCHAR(36) PRIMARY KEY,
                follower_id VARCHAR(36) NOT NULL,
                followee_id VARCHAR(36) NOT NULL,
                created_at TIMESTAMP NOT NULL,
                UNIQUE (follower_id, followee_id),
                FOREIGN KEY (follower_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (followee_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_follows_followee ON follows(followee_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS follows (
                id VARCHAR(36) PRIMARY KEY,
                follower_id VARCHAR(36) NOT NULL,
                followee_id VARCHAR(36) NOT NULL,
                created_at DATETIME(6) NOT NULL,
                UNIQUE (follower_id, followee_id),
                FOREIGN KEY (follower_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (followee_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_follows_followee ON follows(followee_id);
        "#,
    },
    Migration {
        version: 5,
        name: "create_likes_bookmarks_comments",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS likes (
                id VARCHAR(36) PRIMARY KEY,
                curriculum_id VARCHAR(36) NOT NULL,
                user_id VARCHAR(36) NOT NULL,
                created_at TIMESTAMP NOT NULL,
                UNIQUE (curriculum_id, user_id),
                FOREIGN KEY (curriculum_id) REFERENCES curriculums(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_likes_user ON likes(user_id, created_at);
            CREATE TABLE IF NOT EXISTS bookmarks (
                id VARCHAR(36) PRIMARY KEY,
                curriculum_id VARCHAR(36) NOT NULL,
                user_id VARCHAR(36) NOT NULL,
                created_at TIMESTAMP NOT NULL,
                UNIQUE (curriculum_id, user_id),
                FOREIGN KEY (curriculum_id) REFERENCES curriculums(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_bookmarks_user ON bookmarks(user_id, created_at);
            CREATE TABLE IF NOT EXISTS comments (
                id VARCHAR(36) PRIMARY KEY,
                curriculum_id VARCHAR(36) NOT NULL,
                user_id VARCHAR(36) NOT NULL,
                content TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (curriculum_id) REFERENCES curriculums(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_comments_curriculum ON comments(curriculum_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_comments_user ON comments(user_id, created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS likes (
                id VARCHAR(36) PRIMARY KEY,
                curriculum_id VARCHAR(36) NOT NULL,
                user_id VARCHAR(36) NOT NULL,
                created_at DATETIME(6) NOT NULL,
                UNIQUE (curriculum_id, user_id),
                FOREIGN KEY (curriculum_id) REFERENCES curriculums(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_likes_user ON likes(user_id, created_at);
            CREATE TABLE IF NOT EXISTS bookmarks (
                id VARCHAR(36) PRIMARY KEY,
                curriculum_id VARCHAR(36) NOT NULL,
                user_id VARCHAR(36) NOT NULL,
                created_at DATETIME(6) NOT NULL,
                UNIQUE (curriculum_id, user_id),
                FOREIGN KEY (curriculum_id) REFERENCES curriculums(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_bookmarks_user ON bookmarks(user_id, created_at);
            CREATE TABLE IF NOT EXISTS comments (
                id VARCHAR(36) PRIMARY KEY,
                curriculum_id VARCHAR(36) NOT NULL,
                user_id VARCHAR(36) NOT NULL,
                content TEXT NOT NULL,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                FOREIGN KEY (curriculum_id) REFERENCES curriculums(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_comments_curriculum ON comments(curriculum_id, created_at);
            CREATE INDEX idx_comments_user ON comments(user_id, created_at);
        "#,
    },
    Migration {
        version: 6,
        name: "create_taxonomy",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS tags (
                id VARCHAR(36) PRIMARY KEY,
                name VARCHAR(20) NOT NULL UNIQUE,
                usage_count INTEGER NOT NULL DEFAULT 0,
                created_by VARCHAR(36),
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (created_by) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tags_usage ON tags(usage_count);
            CREATE TABLE IF NOT EXISTS categories (
                id VARCHAR(36) PRIMARY KEY,
                name VARCHAR(30) NOT NULL UNIQUE,
                description TEXT,
                color VARCHAR(7) NOT NULL,
                icon VARCHAR(50),
                sort_order INTEGER NOT NULL DEFAULT 0,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            CREATE TABLE IF NOT EXISTS curriculum_tags (
                curriculum_id VARCHAR(36) NOT NULL,
                tag_id VARCHAR(36) NOT NULL,
                added_by VARCHAR(36) NOT NULL,
                created_at TIMESTAMP NOT NULL,
                PRIMARY KEY (curriculum_id, tag_id),
                FOREIGN KEY (curriculum_id) REFERENCES curriculums(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_curriculum_tags_tag ON curriculum_tags(tag_id);
            CREATE TABLE IF NOT EXISTS curriculum_categories (
                curriculum_id VARCHAR(36) PRIMARY KEY,
                category_id VARCHAR(36) NOT NULL,
                assigned_by VARCHAR(36) NOT NULL,
                assigned_at TIMESTAMP NOT NULL,
                FOREIGN KEY (curriculum_id) REFERENCES curriculums(id) ON DELETE CASCADE,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_curriculum_categories_category ON curriculum_categories(category_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS tags (
                id VARCHAR(36) PRIMARY KEY,
                name VARCHAR(20) NOT NULL UNIQUE,
                usage_count BIGINT NOT NULL DEFAULT 0,
                created_by VARCHAR(36),
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                FOREIGN KEY (created_by) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_tags_usage ON tags(usage_count);
            CREATE TABLE IF NOT EXISTS categories (
                id VARCHAR(36) PRIMARY KEY,
                name VARCHAR(30) NOT NULL UNIQUE,
                description TEXT,
                color VARCHAR(7) NOT NULL,
                icon VARCHAR(50),
                sort_order BIGINT NOT NULL DEFAULT 0,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL
            );
            CREATE TABLE IF NOT EXISTS curriculum_tags (
                curriculum_id VARCHAR(36) NOT NULL,
                tag_id VARCHAR(36) NOT NULL,
                added_by VARCHAR(36) NOT NULL,
                created_at DATETIME(6) NOT NULL,
                PRIMARY KEY (curriculum_id, tag_id),
                FOREIGN KEY (curriculum_id) REFERENCES curriculums(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_curriculum_tags_tag ON curriculum_tags(tag_id);
            CREATE TABLE IF NOT EXISTS curriculum_categories (
                curriculum_id VARCHAR(36) PRIMARY KEY,
                category_id VARCHAR(36) NOT NULL,
                assigned_by VARCHAR(36) NOT NULL,
                assigned_at DATETIME(6) NOT NULL,
                FOREIGN KEY (curriculum_id) REFERENCES curriculums(id) ON DELETE CASCADE,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_curriculum_categories_category ON curriculum_categories(category_id);
        "#,
    },
];

/// Run all pending migrations
///
/// # Returns
///
/// Number of migrations applied
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i64> = applied.iter().map(|m| m.version).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&(migration.version as i64)) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at DATETIME(6) NOT NULL
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    const SQL: &str = "SELECT version, name, applied_at FROM _migrations ORDER BY version";
    let records = crate::with_pool!(pool, p => {
        sqlx::query_as::<_, MigrationRecord>(SQL).fetch_all(p).await?
    });
    Ok(records)
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => migration.up_sqlite,
        DatabaseDriver::Mysql => migration.up_mysql,
    };

    crate::with_pool!(pool, p => {
        for statement in split_sql_statements(sql) {
            sqlx::query(statement)
                .execute(p)
                .await
                .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
        }

        sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
            .bind(migration.version as i64)
            .bind(migration.name)
            .bind(Utc::now())
            .execute(p)
            .await?;
    });

    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    if sql.chars().count() > 100 {
        format!("{}...", sql.chars().take(100).collect::<String>())
    } else {
        sql.to_string()
    }
}

/// Split SQL into individual statements, skipping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending_count(pool).await? == 0)
}

/// Get pending migrations count
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = get_applied_migrations(pool).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}

/// Get the total number of migrations defined
pub fn total_migrations() -> usize {
    MIGRATIONS.len()
}

/// Get migration by version
pub fn get_migration(version: i32) -> Option<&'static Migration> {
    MIGRATIONS.iter().find(|m| m.version == version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn table_exists(pool: &DynDatabasePool, name: &str) -> bool {
        let sqlite = pool.as_sqlite().expect("sqlite pool");
        let row: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(name)
                .fetch_optional(sqlite)
                .await
                .expect("Failed to query sqlite_master");
        row.is_some()
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let applied = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(applied, total_migrations());

        // Second run is a no-op
        let applied = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(applied, 0);
    }

    #[tokio::test]
    async fn test_is_up_to_date_and_pending_count() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        assert!(!is_up_to_date(&pool).await.unwrap());
        assert_eq!(pending_count(&pool).await.unwrap(), total_migrations());

        run_migrations(&pool).await.unwrap();

        assert!(is_up_to_date(&pool).await.unwrap());
        assert_eq!(pending_count(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_all_tables_created() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();

        for table in [
            "users",
            "curriculums",
            "week_schedules",
            "summaries",
            "feedbacks",
            "follows",
            "likes",
            "bookmarks",
            "comments",
            "tags",
            "categories",
            "curriculum_tags",
            "curriculum_categories",
        ] {
            assert!(table_exists(&pool, table).await, "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn test_curriculum_delete_cascades_to_weeks() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();

        pool.execute(
            "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at) \
             VALUES ('u1', 'alice', 'a@example.com', 'x', 'USER', '2024-01-01', '2024-01-01')",
        )
        .await
        .unwrap();
        pool.execute(
            "INSERT INTO curriculums (id, owner_id, title, visibility, created_at, updated_at) \
             VALUES ('c1', 'u1', 'Rust', 'PRIVATE', '2024-01-01', '2024-01-01')",
        )
        .await
        .unwrap();
        pool.execute(
            "INSERT INTO week_schedules (curriculum_id, week_number, title, lessons) \
             VALUES ('c1', 1, 'Basics', '[\"ownership\"]')",
        )
        .await
        .unwrap();

        pool.execute("DELETE FROM users WHERE id = 'u1'").await.unwrap();

        let sqlite = pool.as_sqlite().unwrap();
        let (weeks,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM week_schedules")
            .fetch_one(sqlite)
            .await
            .unwrap();
        assert_eq!(weeks, 0);
    }

    #[tokio::test]
    async fn test_unique_follow_pair() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();

        for (id, name) in [("u1", "alice"), ("u2", "bob")] {
            pool.execute(&format!(
                "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at) \
                 VALUES ('{id}', '{name}', '{name}@example.com', 'x', 'USER', '2024-01-01', '2024-01-01')"
            ))
            .await
            .unwrap();
        }

        let insert = "INSERT INTO follows (id, follower_id, followee_id, created_at) \
                      VALUES ('{}', 'u1', 'u2', '2024-01-01')";
        pool.execute(&insert.replace("{}", "f1")).await.unwrap();
        assert!(pool.execute(&insert.replace("{}", "f2")).await.is_err());
    }

    #[test]
    fn test_get_migration() {
        assert_eq!(get_migration(1).map(|m| m.name), Some("create_users"));
        assert!(get_migration(999).is_none());
    }

    #[test]
    fn test_total_migrations() {
        assert_eq!(total_migrations(), 6);
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT); CREATE TABLE b (id INT);";
        assert_eq!(split_sql_statements(sql).len(), 2);

        let sql_with_comments = "-- Comment\nCREATE TABLE a (id INT);\n-- trailing";
        assert_eq!(split_sql_statements(sql_with_comments).len(), 1);
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- This is a comment"));
        assert!(is_comment_only("-- Line 1\n-- Line 2"));
        assert!(!is_comment_only("CREATE TABLE test"));
        assert!(!is_comment_only("-- Comment\nCREATE TABLE test"));
    }
}
