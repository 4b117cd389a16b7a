//! Database layer
//!
//! Supports SQLite (default, single-binary deployment) and MySQL. The driver
//! is selected by configuration and hidden behind [`DatabasePool`].
//!
//! Repositories write each query once and run it against whichever backend is
//! active through [`with_pool!`]: both drivers use `?` placeholders and the
//! schema only relies on types that decode identically on both.

/// Run `$body` with `$p` bound to the concrete sqlx pool of the active driver.
///
/// The body is expanded once per driver, so it must type-check against both
/// `SqlitePool` and `MySqlPool`. Must be used inside a function returning
/// `anyhow::Result`.
#[macro_export]
macro_rules! with_pool {
    ($pool:expr, $p:ident => $body:expr) => {
        match $pool.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                let $p = $pool
                    .as_sqlite()
                    .ok_or_else(|| ::anyhow::anyhow!("database driver mismatch: expected SQLite pool"))?;
                $body
            }
            $crate::config::DatabaseDriver::Mysql => {
                let $p = $pool
                    .as_mysql()
                    .ok_or_else(|| ::anyhow::anyhow!("database driver mismatch: expected MySQL pool"))?;
                $body
            }
        }
    };
}

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, DatabasePool, DynDatabasePool, SqlxPool};

/// Build `?, ?, ?` for an `IN (...)` clause with `count` parameters.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
