//! Connection pools
//!
//! [`SqlxPool`] owns either a SQLite or a MySQL pool. Repositories never name
//! the backend; they reach the concrete pool through [`with_pool!`](crate::with_pool).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
};

use crate::config::{DatabaseConfig, DatabaseDriver};

/// Connections kept for a file-backed SQLite database
const SQLITE_MAX_CONNECTIONS: u32 = 20;
const MYSQL_MAX_CONNECTIONS: u32 = 30;

/// What the rest of the crate needs from a database handle.
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Run a statement and return the number of affected rows
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Round-trip a trivial query
    async fn ping(&self) -> Result<()>;

    /// Wait for checked-out connections and close the pool
    async fn close(&self);

    fn driver(&self) -> DatabaseDriver;

    fn as_sqlite(&self) -> Option<&SqlitePool>;

    fn as_mysql(&self) -> Option<&MySqlPool>;
}

pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// A sqlx pool for whichever driver the config selected
#[derive(Debug, Clone)]
pub enum SqlxPool {
    Sqlite(SqlitePool),
    Mysql(MySqlPool),
}

/// Where a SQLite url points
#[derive(Debug, PartialEq, Eq)]
enum SqliteTarget {
    Memory,
    File(PathBuf),
}

impl SqliteTarget {
    /// Accepts `:memory:`, `sqlite::memory:`, `sqlite:<path>` and bare paths.
    /// Query options after `?` are dropped.
    fn parse(url: &str) -> Self {
        let rest = url.strip_prefix("sqlite:").unwrap_or(url);
        let rest = rest.trim_start_matches("//");
        let path = rest.split('?').next().unwrap_or_default();
        if path.is_empty() || path == ":memory:" {
            SqliteTarget::Memory
        } else {
            SqliteTarget::File(PathBuf::from(path))
        }
    }
}

fn mysql_url(url: &str) -> String {
    if url.starts_with("mysql://") {
        url.to_string()
    } else {
        format!("mysql://{}", url)
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create database directory: {}", dir.display())),
        _ => Ok(()),
    }
}

impl SqlxPool {
    /// Open a SQLite pool with foreign keys enforced on every connection.
    ///
    /// Each in-memory connection is its own database, so an in-memory pool
    /// is capped at one connection.
    pub async fn sqlite(url: &str) -> Result<Self> {
        let (options, max_connections) = match SqliteTarget::parse(url) {
            SqliteTarget::Memory => (SqliteConnectOptions::from_str("sqlite::memory:")?, 1),
            SqliteTarget::File(path) => {
                ensure_parent_dir(&path)?;
                let options = SqliteConnectOptions::new()
                    .filename(&path)
                    .create_if_missing(true);
                (options, SQLITE_MAX_CONNECTIONS)
            }
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options.foreign_keys(true))
            .await
            .with_context(|| format!("Failed to open SQLite database: {}", url))?;
        Ok(SqlxPool::Sqlite(pool))
    }

    pub async fn mysql(url: &str) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(MYSQL_MAX_CONNECTIONS)
            .connect(&mysql_url(url))
            .await
            .with_context(|| format!("Failed to connect to MySQL: {}", url))?;
        Ok(SqlxPool::Mysql(pool))
    }
}

#[async_trait]
impl DatabasePool for SqlxPool {
    async fn execute(&self, sql: &str) -> Result<u64> {
        let done = match self {
            SqlxPool::Sqlite(p) => sqlx::query(sql).execute(p).await.map(|r| r.rows_affected()),
            SqlxPool::Mysql(p) => sqlx::query(sql).execute(p).await.map(|r| r.rows_affected()),
        };
        done.with_context(|| format!("Statement failed: {}", sql))
    }

    async fn ping(&self) -> Result<()> {
        let done = match self {
            SqlxPool::Sqlite(p) => sqlx::query("SELECT 1").execute(p).await.map(drop),
            SqlxPool::Mysql(p) => sqlx::query("SELECT 1").execute(p).await.map(drop),
        };
        done.context("Database ping failed")
    }

    async fn close(&self) {
        match self {
            SqlxPool::Sqlite(p) => p.close().await,
            SqlxPool::Mysql(p) => p.close().await,
        }
    }

    fn driver(&self) -> DatabaseDriver {
        match self {
            SqlxPool::Sqlite(_) => DatabaseDriver::Sqlite,
            SqlxPool::Mysql(_) => DatabaseDriver::Mysql,
        }
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        match self {
            SqlxPool::Sqlite(p) => Some(p),
            SqlxPool::Mysql(_) => None,
        }
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        match self {
            SqlxPool::Mysql(p) => Some(p),
            SqlxPool::Sqlite(_) => None,
        }
    }
}

/// Connect to the database named in `config`
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    let pool = match config.driver {
        DatabaseDriver::Sqlite => SqlxPool::sqlite(&config.url).await?,
        DatabaseDriver::Mysql => SqlxPool::mysql(&config.url).await?,
    };
    Ok(Arc::new(pool))
}

/// Fresh in-memory SQLite database, without migrations
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    Ok(Arc::new(SqlxPool::sqlite(":memory:").await?))
}
