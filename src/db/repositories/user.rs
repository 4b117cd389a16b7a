//! User repository
//!
//! Database operations for user accounts.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::{placeholders, DynDatabasePool};
use crate::models::{ListParams, User};
use crate::with_pool;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: &str) -> Result<Option<User>>;

    /// Lookup by (already normalized) email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<User>>;

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<User>>;

    /// Persist name, password hash, role and updated_at
    async fn update(&self, user: &User) -> Result<User>;

    /// Delete a user; returns false when no row matched
    async fn delete(&self, id: &str) -> Result<bool>;

    /// List users newest first with the total count
    async fn list(&self, params: &ListParams) -> Result<(Vec<User>, i64)>;
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            role: row.role.parse()?,
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_users(rows: Vec<UserRow>) -> Result<Vec<User>> {
    rows.into_iter().map(User::try_from).collect()
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }

    async fn find_one(&self, column: &'static str, value: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT id, name, email, password_hash, role, created_at, updated_at \
             FROM users WHERE {} = ?",
            column
        );
        let row = with_pool!(self.pool, p => {
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(value)
                .fetch_optional(p)
                .await
                .with_context(|| format!("Failed to get user by {}", column))?
        });
        row.map(User::try_from).transpose()
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        with_pool!(self.pool, p => {
            sqlx::query(
                r#"
                INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.to_string())
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(p)
            .await
            .context("Failed to create user")?;
        });
        Ok(user.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        self.find_one("id", id).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_one("email", email).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<User>> {
        self.find_one("name", name).await
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, name, email, password_hash, role, created_at, updated_at \
             FROM users WHERE id IN ({})",
            placeholders(ids.len())
        );
        let rows = with_pool!(self.pool, p => {
            let mut query = sqlx::query_as::<_, UserRow>(&sql);
            for id in ids {
                query = query.bind(id);
            }
            query.fetch_all(p).await.context("Failed to get users by ids")?
        });
        into_users(rows)
    }

    async fn update(&self, user: &User) -> Result<User> {
        with_pool!(self.pool, p => {
            sqlx::query(
                r#"
                UPDATE users SET name = ?, password_hash = ?, role = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(user.role.to_string())
            .bind(user.updated_at)
            .bind(&user.id)
            .execute(p)
            .await
            .context("Failed to update user")?;
        });
        Ok(user.clone())
    }

    /// Delete the user. Owned curricula go with it through the cascade, so
    /// the usage of their tags is released first in the same transaction.
    async fn delete(&self, id: &str) -> Result<bool> {
        let result = with_pool!(self.pool, p => {
            let mut tx = p.begin().await.context("Failed to begin transaction")?;
            sqlx::query(
                r#"
                UPDATE tags SET usage_count = usage_count - (
                    SELECT COUNT(*) FROM curriculum_tags ct
                    JOIN curriculums c ON c.id = ct.curriculum_id
                    WHERE ct.tag_id = tags.id AND c.owner_id = ?
                )
                WHERE id IN (
                    SELECT ct.tag_id FROM curriculum_tags ct
                    JOIN curriculums c ON c.id = ct.curriculum_id
                    WHERE c.owner_id = ?
                )
                "#,
            )
            .bind(id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to release tag usage")?;

            let affected = sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete user")?
                .rows_affected();
            tx.commit().await.context("Failed to commit user delete")?;
            affected
        });
        Ok(result > 0)
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<User>, i64)> {
        let (rows, total) = with_pool!(self.pool, p => {
            let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
                .fetch_one(p)
                .await
                .context("Failed to count users")?;
            let rows = sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, name, email, password_hash, role, created_at, updated_at
                FROM users ORDER BY created_at DESC, id LIMIT ? OFFSET ?
                "#,
            )
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(p)
            .await
            .context("Failed to list users")?;
            (rows, total)
        });
        Ok((into_users(rows)?, total))
    }
}
