//! Category repository
//!
//! Categories and the single category assigned to each curriculum.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::{viewable_filter, Arg};
use crate::db::{placeholders, DynDatabasePool};
use crate::models::{Category, ListParams};
use crate::with_pool;

/// A category with the number of curricula assigned to it
#[derive(Debug, Clone, Serialize)]
pub struct CategoryWithUsage {
    #[serde(flatten)]
    pub category: Category,
    pub usage_count: i64,
}

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, category: &Category) -> Result<()>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Category>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>>;

    /// Persist every mutable column
    async fn update(&self, category: &Category) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<bool>;

    /// Categories ordered by sort order then name
    async fn list(&self, include_inactive: bool) -> Result<Vec<CategoryWithUsage>>;

    /// One past the current highest sort order
    async fn next_sort_order(&self) -> Result<i64>;

    async fn usage_count(&self, id: &str) -> Result<i64>;

    /// Apply several sort orders atomically
    async fn set_sort_orders(&self, orders: &[(String, i64)]) -> Result<()>;

    /// Assign a curriculum's category, replacing any previous one
    async fn assign(&self, curriculum_id: &str, category_id: &str, assigned_by: &str) -> Result<()>;

    async fn unassign(&self, curriculum_id: &str) -> Result<bool>;

    async fn category_for_curriculum(&self, curriculum_id: &str) -> Result<Option<Category>>;

    async fn categories_for_curricula(&self, ids: &[String]) -> Result<HashMap<String, Category>>;

    /// Ids of curricula in a category, most recently updated first.
    /// `viewer` limits results to what that user may see; `None` sees all.
    async fn curriculum_ids_in_category(
        &self,
        category_id: &str,
        viewer: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<String>, i64)>;
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: String,
    name: String,
    description: Option<String>,
    color: String,
    icon: Option<String>,
    sort_order: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            description: row.description,
            color: row.color,
            icon: row.icon,
            sort_order: row.sort_order,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AssignedCategoryRow {
    curriculum_id: String,
    #[sqlx(flatten)]
    category: CategoryRow,
}

const CATEGORY_COLUMNS: &str = "g.id, g.name, g.description, g.color, g.icon, g.sort_order, \
     g.is_active, g.created_at, g.updated_at";

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }

    async fn find_one(&self, column: &'static str, value: &str) -> Result<Option<Category>> {
        let sql = format!("SELECT {} FROM categories g WHERE g.{} = ?", CATEGORY_COLUMNS, column);
        let row = with_pool!(self.pool, p => {
            sqlx::query_as::<_, CategoryRow>(&sql)
                .bind(value)
                .fetch_optional(p)
                .await
                .context("Failed to get category")?
        });
        Ok(row.map(Category::from))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<()> {
        with_pool!(self.pool, p => {
            sqlx::query(
                r#"
                INSERT INTO categories
                    (id, name, description, color, icon, sort_order, is_active, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&category.id)
            .bind(&category.name)
            .bind(&category.description)
            .bind(&category.color)
            .bind(&category.icon)
            .bind(category.sort_order)
            .bind(category.is_active)
            .bind(category.created_at)
            .bind(category.updated_at)
            .execute(p)
            .await
            .context("Failed to create category")?;
        });
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Category>> {
        self.find_one("id", id).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>> {
        self.find_one("name", name).await
    }

    async fn update(&self, category: &Category) -> Result<()> {
        with_pool!(self.pool, p => {
            sqlx::query(
                r#"
                UPDATE categories
                SET name = ?, description = ?, color = ?, icon = ?, sort_order = ?,
                    is_active = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&category.name)
            .bind(&category.description)
            .bind(&category.color)
            .bind(&category.icon)
            .bind(category.sort_order)
            .bind(category.is_active)
            .bind(category.updated_at)
            .bind(&category.id)
            .execute(p)
            .await
            .context("Failed to update category")?;
        });
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let affected = with_pool!(self.pool, p => {
            sqlx::query("DELETE FROM categories WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete category")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<CategoryWithUsage>> {
        let filter = if include_inactive { "" } else { "WHERE g.is_active = ?" };
        let sql = format!(
            "SELECT {} FROM categories g {} ORDER BY g.sort_order, g.name",
            CATEGORY_COLUMNS, filter
        );
        let (rows, usage) = with_pool!(self.pool, p => {
            let mut query = sqlx::query_as::<_, CategoryRow>(&sql);
            if !include_inactive {
                query = query.bind(true);
            }
            let rows = query.fetch_all(p).await.context("Failed to list categories")?;
            let usage: Vec<(String, i64)> = sqlx::query_as(
                "SELECT category_id, COUNT(*) FROM curriculum_categories GROUP BY category_id",
            )
            .fetch_all(p)
            .await
            .context("Failed to count category usage")?;
            (rows, usage)
        });

        let usage: HashMap<String, i64> = usage.into_iter().collect();
        Ok(rows
            .into_iter()
            .map(|row| {
                let usage_count = usage.get(&row.id).copied().unwrap_or(0);
                CategoryWithUsage {
                    category: row.into(),
                    usage_count,
                }
            })
            .collect())
    }

    async fn next_sort_order(&self) -> Result<i64> {
        let max = with_pool!(self.pool, p => {
            let (max,): (Option<i64>,) = sqlx::query_as("SELECT MAX(sort_order) FROM categories")
                .fetch_one(p)
                .await
                .context("Failed to read sort order")?;
            max
        });
        Ok(max.unwrap_or(0) + 1)
    }

    async fn usage_count(&self, id: &str) -> Result<i64> {
        let count = with_pool!(self.pool, p => {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM curriculum_categories WHERE category_id = ?")
                    .bind(id)
                    .fetch_one(p)
                    .await
                    .context("Failed to count category usage")?;
            count
        });
        Ok(count)
    }

    async fn set_sort_orders(&self, orders: &[(String, i64)]) -> Result<()> {
        let now = Utc::now();
        with_pool!(self.pool, p => {
            let mut tx = p.begin().await.context("Failed to begin transaction")?;
            for (id, sort_order) in orders {
                sqlx::query("UPDATE categories SET sort_order = ?, updated_at = ? WHERE id = ?")
                    .bind(sort_order)
                    .bind(now)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to reorder category")?;
            }
            tx.commit().await.context("Failed to commit reorder")?;
        });
        Ok(())
    }

    async fn assign(&self, curriculum_id: &str, category_id: &str, assigned_by: &str) -> Result<()> {
        let now = Utc::now();
        with_pool!(self.pool, p => {
            let mut tx = p.begin().await.context("Failed to begin transaction")?;
            sqlx::query("DELETE FROM curriculum_categories WHERE curriculum_id = ?")
                .bind(curriculum_id)
                .execute(&mut *tx)
                .await
                .context("Failed to clear category")?;
            sqlx::query(
                "INSERT INTO curriculum_categories (curriculum_id, category_id, assigned_by, assigned_at) VALUES (?, ?, ?, ?)",
            )
            .bind(curriculum_id)
            .bind(category_id)
            .bind(assigned_by)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to assign category")?;
            tx.commit().await.context("Failed to commit category assignment")?;
        });
        Ok(())
    }

    async fn unassign(&self, curriculum_id: &str) -> Result<bool> {
        let affected = with_pool!(self.pool, p => {
            sqlx::query("DELETE FROM curriculum_categories WHERE curriculum_id = ?")
                .bind(curriculum_id)
                .execute(p)
                .await
                .context("Failed to unassign category")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn category_for_curriculum(&self, curriculum_id: &str) -> Result<Option<Category>> {
        Ok(self
            .categories_for_curricula(&[curriculum_id.to_string()])
            .await?
            .remove(curriculum_id))
    }

    async fn categories_for_curricula(&self, ids: &[String]) -> Result<HashMap<String, Category>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT cc.curriculum_id, {} FROM curriculum_categories cc \
             JOIN categories g ON g.id = cc.category_id WHERE cc.curriculum_id IN ({})",
            CATEGORY_COLUMNS,
            placeholders(ids.len())
        );
        let rows = with_pool!(self.pool, p => {
            let mut query = sqlx::query_as::<_, AssignedCategoryRow>(&sql);
            for id in ids {
                query = query.bind(id);
            }
            query.fetch_all(p).await.context("Failed to load curriculum categories")?
        });
        Ok(rows
            .into_iter()
            .map(|row| (row.curriculum_id, row.category.into()))
            .collect())
    }

    async fn curriculum_ids_in_category(
        &self,
        category_id: &str,
        viewer: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<String>, i64)> {
        let mut args = vec![Arg::Text(category_id)];
        let viewable = viewable_filter(viewer, &mut args);
        let from = format!(
            "FROM curriculums c JOIN curriculum_categories cc ON cc.curriculum_id = c.id \
             WHERE cc.category_id = ? AND {}",
            viewable
        );
        let count_sql = format!("SELECT COUNT(*) {}", from);
        let list_sql = format!(
            "SELECT c.id {} ORDER BY c.updated_at DESC, c.id LIMIT ? OFFSET ?",
            from
        );

        let (ids, total) = with_pool!(self.pool, p => {
            let (total,) = bind_args!(sqlx::query_as::<_, (i64,)>(&count_sql), &args)
                .fetch_one(p)
                .await
                .context("Failed to count curricula in category")?;
            let rows = bind_args!(sqlx::query_as::<_, (String,)>(&list_sql), &args)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to list curricula in category")?;
            (rows.into_iter().map(|(id,)| id).collect::<Vec<_>>(), total)
        });
        Ok((ids, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_curriculum, insert_user, setup_pool};
    use crate::models::{CategoryName, TagColor, Visibility};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxCategoryRepository) {
        let pool = setup_pool().await;
        let repo = SqlxCategoryRepository::new(pool.clone());
        (pool, repo)
    }

    async fn insert_category(repo: &SqlxCategoryRepository, name: &str, sort_order: i64) -> Category {
        let category = Category::new(
            CategoryName::parse(name).unwrap(),
            None,
            TagColor::parse("#336699").unwrap(),
            None,
            sort_order,
        );
        repo.create(&category).await.expect("Failed to create category");
        category
    }

    #[tokio::test]
    async fn test_create_update_delete() {
        let (_pool, repo) = setup_test_repo().await;
        let mut category = insert_category(&repo, "Programming", 1).await;

        assert!(repo.get_by_name("Programming").await.unwrap().is_some());
        category.is_active = false;
        category.description = Some("Code".into());
        repo.update(&category).await.unwrap();

        let found = repo.get_by_id(&category.id).await.unwrap().unwrap();
        assert!(!found.is_active);
        assert_eq!(found.description.as_deref(), Some("Code"));

        assert!(repo.delete(&category.id).await.unwrap());
        assert!(repo.get_by_id(&category.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_order_and_activity_filter() {
        let (_pool, repo) = setup_test_repo().await;
        insert_category(&repo, "Science", 2).await;
        let mut art = insert_category(&repo, "Art", 1).await;
        insert_category(&repo, "Business", 2).await;

        let names: Vec<String> = repo
            .list(true)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.category.name)
            .collect();
        assert_eq!(names, vec!["Art", "Business", "Science"]);

        art.is_active = false;
        repo.update(&art).await.unwrap();
        assert_eq!(repo.list(false).await.unwrap().len(), 2);
        assert_eq!(repo.next_sort_order().await.unwrap(), 3);

        repo.set_sort_orders(&[(art.id.clone(), 9)]).await.unwrap();
        assert_eq!(repo.get_by_id(&art.id).await.unwrap().unwrap().sort_order, 9);
    }

    #[tokio::test]
    async fn test_next_sort_order_on_empty_table() {
        let (_pool, repo) = setup_test_repo().await;
        assert_eq!(repo.next_sort_order().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_assignment_replaces_previous() {
        let (pool, repo) = setup_test_repo().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        let c = insert_curriculum(&pool, &alice, "Rust basics", Visibility::Private, 1).await;
        let first = insert_category(&repo, "Programming", 1).await;
        let second = insert_category(&repo, "Systems", 2).await;

        repo.assign(&c.id, &first.id, &alice.id).await.unwrap();
        repo.assign(&c.id, &second.id, &alice.id).await.unwrap();

        let assigned = repo.category_for_curriculum(&c.id).await.unwrap().unwrap();
        assert_eq!(assigned.id, second.id);
        assert_eq!(repo.usage_count(&first.id).await.unwrap(), 0);
        assert_eq!(repo.usage_count(&second.id).await.unwrap(), 1);

        let listed = repo.list(true).await.unwrap();
        let systems = listed.iter().find(|c| c.category.id == second.id).unwrap();
        assert_eq!(systems.usage_count, 1);

        let params = ListParams::new(1, 10);
        let (_, total) = repo
            .curriculum_ids_in_category(&second.id, Some(&bob.id), &params)
            .await
            .unwrap();
        assert_eq!(total, 0);
        let (ids, _) = repo
            .curriculum_ids_in_category(&second.id, Some(&alice.id), &params)
            .await
            .unwrap();
        assert_eq!(ids, vec![c.id.clone()]);

        assert!(repo.unassign(&c.id).await.unwrap());
        assert!(!repo.unassign(&c.id).await.unwrap());
        assert!(repo.category_for_curriculum(&c.id).await.unwrap().is_none());
    }
}
