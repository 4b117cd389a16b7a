//! Taxonomy service
//!
//! Tags are created on demand by any user and shared between curricula.
//! Categories are curated by admins; a curriculum sits in at most one.

use crate::cache::MemoryCache;
use crate::db::repositories::{CategoryRepository, CategoryWithUsage, CurriculumRepository, TagRepository};
use crate::metrics::{self, Event};
use crate::models::{
    Category, CategoryName, Curriculum, CurriculumSummary, ListParams, PagedResult, Tag, TagColor,
    TagName, User, ValidationError, MAX_TAGS_PER_CURRICULUM,
};
use crate::services::feed::invalidate_feed;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_POPULAR_LIMIT: i64 = 20;
pub const MAX_POPULAR_LIMIT: i64 = 100;
pub const DEFAULT_SEARCH_LIMIT: i64 = 10;
pub const MAX_SEARCH_LIMIT: i64 = 50;

const MOST_USED_IN_STATS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum TaxonomyServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Tag not found")]
    TagNotFound,

    #[error("Category not found")]
    CategoryNotFound,

    #[error("Curriculum not found")]
    CurriculumNotFound,

    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    #[error("Tag is still attached to curricula")]
    TagInUse,

    #[error("Category is still assigned to curricula")]
    CategoryInUse,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ValidationError> for TaxonomyServiceError {
    fn from(e: ValidationError) -> Self {
        TaxonomyServiceError::ValidationError(e.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TagStatistics {
    pub total_tags: i64,
    pub popular_tags: i64,
    pub unused_tags: i64,
    pub most_used: Vec<Tag>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryStatistics {
    pub total_categories: usize,
    pub active_categories: usize,
    pub inactive_categories: usize,
    pub used_categories: usize,
    pub most_used: Vec<CategoryWithUsage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurriculumTaxonomy {
    pub curriculum_id: String,
    pub tags: Vec<Tag>,
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub color: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub sort_order: Option<i64>,
}

fn check_limit(limit: i64, max: i64) -> Result<(), ValidationError> {
    if (1..=max).contains(&limit) {
        Ok(())
    } else {
        Err(ValidationError::new(format!("limit must be between 1 and {}", max)))
    }
}

fn check_sort_order(sort_order: i64) -> Result<(), ValidationError> {
    if sort_order < 0 {
        return Err(ValidationError::new("sort_order must not be negative"));
    }
    Ok(())
}

pub struct TaxonomyService {
    tag_repo: Arc<dyn TagRepository>,
    category_repo: Arc<dyn CategoryRepository>,
    curriculum_repo: Arc<dyn CurriculumRepository>,
    cache: Arc<MemoryCache>,
}

impl TaxonomyService {
    pub fn new(
        tag_repo: Arc<dyn TagRepository>,
        category_repo: Arc<dyn CategoryRepository>,
        curriculum_repo: Arc<dyn CurriculumRepository>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        Self {
            tag_repo,
            category_repo,
            curriculum_repo,
            cache,
        }
    }

    // Tags

    async fn find_or_create_tag(&self, user: &User, name: TagName) -> Result<Tag, TaxonomyServiceError> {
        if let Some(tag) = self.tag_repo.get_by_name(name.as_str()).await? {
            return Ok(tag);
        }
        let tag = Tag::new(name, &user.id);
        self.tag_repo.create(&tag).await?;
        tracing::info!(tag_id = %tag.id, name = %tag.name, "Tag created");
        metrics::record(Event::TagCreation);
        Ok(tag)
    }

    /// Return the tag named `name`, creating it when it does not exist yet
    pub async fn create_tag(&self, user: &User, name: &str) -> Result<Tag, TaxonomyServiceError> {
        self.find_or_create_tag(user, TagName::parse(name)?).await
    }

    pub async fn list_tags(
        &self,
        search: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<Tag>, TaxonomyServiceError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        let (items, total) = self.tag_repo.list(search, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn popular_tags(&self, limit: i64, min_usage: i64) -> Result<Vec<Tag>, TaxonomyServiceError> {
        check_limit(limit, MAX_POPULAR_LIMIT)?;
        if min_usage < 0 {
            return Err(ValidationError::new("min_usage must not be negative").into());
        }
        Ok(self.tag_repo.popular(limit, min_usage).await?)
    }

    /// Autocomplete suggestions for a name prefix
    pub async fn search_tags(&self, query: &str, limit: i64) -> Result<Vec<Tag>, TaxonomyServiceError> {
        check_limit(limit, MAX_SEARCH_LIMIT)?;
        let prefix = query.trim().to_lowercase();
        if prefix.is_empty() {
            return Err(ValidationError::new("Search query must not be empty").into());
        }
        Ok(self.tag_repo.search_prefix(&prefix, limit).await?)
    }

    pub async fn tag_statistics(&self) -> Result<TagStatistics, TaxonomyServiceError> {
        let counts = self.tag_repo.counts().await?;
        let most_used = self.tag_repo.popular(MOST_USED_IN_STATS as i64, 1).await?;
        Ok(TagStatistics {
            total_tags: counts.total,
            popular_tags: counts.popular,
            unused_tags: counts.unused,
            most_used,
        })
    }

    pub async fn get_tag(&self, id: &str) -> Result<Tag, TaxonomyServiceError> {
        self.tag_repo
            .get_by_id(id)
            .await?
            .ok_or(TaxonomyServiceError::TagNotFound)
    }

    /// Rename a tag; allowed for its creator and admins
    pub async fn update_tag(&self, user: &User, id: &str, name: &str) -> Result<Tag, TaxonomyServiceError> {
        let mut tag = self.get_tag(id).await?;
        if !user.is_admin() && tag.created_by.as_deref() != Some(user.id.as_str()) {
            return Err(TaxonomyServiceError::PermissionDenied);
        }
        let name = TagName::parse(name)?;
        if name.as_str() == tag.name {
            return Ok(tag);
        }
        if self.tag_repo.get_by_name(name.as_str()).await?.is_some() {
            return Err(TaxonomyServiceError::AlreadyExists("Tag"));
        }

        tag.name = name.as_str().to_string();
        tag.updated_at = Utc::now();
        self.tag_repo.update(&tag).await?;
        invalidate_feed(&self.cache).await;
        Ok(tag)
    }

    pub async fn delete_tag(&self, user: &User, id: &str) -> Result<(), TaxonomyServiceError> {
        if !user.is_admin() {
            return Err(TaxonomyServiceError::PermissionDenied);
        }
        let tag = self.get_tag(id).await?;
        if !tag.is_unused() {
            return Err(TaxonomyServiceError::TagInUse);
        }
        self.tag_repo.delete(&tag.id).await?;
        tracing::info!(tag_id = %tag.id, name = %tag.name, "Tag deleted");
        Ok(())
    }

    // Categories

    pub async fn create_category(&self, input: CreateCategoryInput) -> Result<Category, TaxonomyServiceError> {
        let name = CategoryName::parse(&input.name)?;
        let color = TagColor::parse(&input.color)?;
        check_sort_order(input.sort_order)?;
        if self.category_repo.get_by_name(name.as_str()).await?.is_some() {
            return Err(TaxonomyServiceError::AlreadyExists("Category"));
        }

        let sort_order = match input.sort_order {
            0 => self.category_repo.next_sort_order().await?,
            n => n,
        };
        let category = Category::new(name, input.description, color, input.icon, sort_order);
        self.category_repo.create(&category).await?;
        tracing::info!(category_id = %category.id, name = %category.name, "Category created");
        Ok(category)
    }

    pub async fn list_categories(&self, include_inactive: bool) -> Result<Vec<CategoryWithUsage>, TaxonomyServiceError> {
        Ok(self.category_repo.list(include_inactive).await?)
    }

    pub async fn category_statistics(&self) -> Result<CategoryStatistics, TaxonomyServiceError> {
        let all = self.category_repo.list(true).await?;
        let active = all.iter().filter(|c| c.category.is_active).count();
        let used = all.iter().filter(|c| c.usage_count > 0).count();

        let mut most_used: Vec<CategoryWithUsage> = all.iter().filter(|c| c.usage_count > 0).cloned().collect();
        most_used.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
        most_used.truncate(MOST_USED_IN_STATS);

        Ok(CategoryStatistics {
            total_categories: all.len(),
            active_categories: active,
            inactive_categories: all.len() - active,
            used_categories: used,
            most_used,
        })
    }

    async fn load_category(&self, id: &str) -> Result<Category, TaxonomyServiceError> {
        self.category_repo
            .get_by_id(id)
            .await?
            .ok_or(TaxonomyServiceError::CategoryNotFound)
    }

    pub async fn get_category(&self, id: &str) -> Result<CategoryWithUsage, TaxonomyServiceError> {
        let category = self.load_category(id).await?;
        let usage_count = self.category_repo.usage_count(&category.id).await?;
        Ok(CategoryWithUsage { category, usage_count })
    }

    pub async fn update_category(
        &self,
        id: &str,
        input: UpdateCategoryInput,
    ) -> Result<Category, TaxonomyServiceError> {
        let mut category = self.load_category(id).await?;

        if let Some(raw) = input.name {
            let name = CategoryName::parse(&raw)?;
            if name.as_str() != category.name {
                if self.category_repo.get_by_name(name.as_str()).await?.is_some() {
                    return Err(TaxonomyServiceError::AlreadyExists("Category"));
                }
                category.name = name.into_inner();
            }
        }
        if let Some(color) = input.color {
            category.color = TagColor::parse(&color)?.into_inner();
        }
        if let Some(description) = input.description {
            category.description = Some(description).filter(|d| !d.trim().is_empty());
        }
        if let Some(icon) = input.icon {
            category.icon = Some(icon).filter(|i| !i.trim().is_empty());
        }
        if let Some(sort_order) = input.sort_order {
            check_sort_order(sort_order)?;
            category.sort_order = sort_order;
        }

        category.updated_at = Utc::now();
        self.category_repo.update(&category).await?;
        invalidate_feed(&self.cache).await;
        Ok(category)
    }

    /// Delete a category; it must be deactivated and unused first
    pub async fn delete_category(&self, id: &str) -> Result<(), TaxonomyServiceError> {
        let category = self.load_category(id).await?;
        if category.is_active {
            return Err(ValidationError::new("Deactivate the category before deleting it").into());
        }
        if self.category_repo.usage_count(&category.id).await? > 0 {
            return Err(TaxonomyServiceError::CategoryInUse);
        }
        self.category_repo.delete(&category.id).await?;
        tracing::info!(category_id = %category.id, name = %category.name, "Category deleted");
        Ok(())
    }

    pub async fn set_category_active(&self, id: &str, active: bool) -> Result<Category, TaxonomyServiceError> {
        let mut category = self.load_category(id).await?;
        if category.is_active != active {
            category.is_active = active;
            category.updated_at = Utc::now();
            self.category_repo.update(&category).await?;
            tracing::info!(category_id = %category.id, active, "Category activation changed");
        }
        Ok(category)
    }

    /// Apply new sort orders; every category must exist
    pub async fn reorder_categories(&self, orders: Vec<(String, i64)>) -> Result<(), TaxonomyServiceError> {
        if orders.is_empty() {
            return Err(ValidationError::new("No categories to reorder").into());
        }
        for (id, sort_order) in &orders {
            check_sort_order(*sort_order)?;
            self.load_category(id).await?;
        }
        self.category_repo.set_sort_orders(&orders).await?;
        Ok(())
    }

    // Curriculum tagging

    async fn load_curriculum(&self, user: &User, id: &str, modify: bool) -> Result<Curriculum, TaxonomyServiceError> {
        let curriculum = match self.curriculum_repo.get_by_id(id).await? {
            Some(c) if c.can_view(&user.id, user.is_admin()) => c,
            _ => return Err(TaxonomyServiceError::CurriculumNotFound),
        };
        if modify && !curriculum.can_modify(&user.id, user.is_admin()) {
            return Err(TaxonomyServiceError::PermissionDenied);
        }
        Ok(curriculum)
    }

    /// Attach tags by name, creating missing ones. Returns the resulting tag set.
    pub async fn add_tags(
        &self,
        user: &User,
        curriculum_id: &str,
        tag_names: &[String],
    ) -> Result<Vec<Tag>, TaxonomyServiceError> {
        let curriculum = self.load_curriculum(user, curriculum_id, true).await?;
        let names = TagName::parse_list(tag_names)?;
        if names.is_empty() {
            return Err(ValidationError::new("At least one tag name is required").into());
        }

        let current = self.tag_repo.tags_for_curriculum(&curriculum.id).await?;
        let new_names: Vec<TagName> = names
            .into_iter()
            .filter(|n| !current.iter().any(|t| t.name == n.as_str()))
            .collect();
        if current.len() + new_names.len() > MAX_TAGS_PER_CURRICULUM {
            return Err(ValidationError::new(format!(
                "A curriculum can carry at most {} tags",
                MAX_TAGS_PER_CURRICULUM
            ))
            .into());
        }

        for name in new_names {
            let tag = self.find_or_create_tag(user, name).await?;
            self.tag_repo.attach(&curriculum.id, &tag.id, &user.id).await?;
            metrics::record(Event::CurriculumTagAssignment);
        }
        invalidate_feed(&self.cache).await;
        Ok(self.tag_repo.tags_for_curriculum(&curriculum.id).await?)
    }

    pub async fn remove_tag(&self, user: &User, curriculum_id: &str, tag_name: &str) -> Result<(), TaxonomyServiceError> {
        let curriculum = self.load_curriculum(user, curriculum_id, true).await?;
        let name = TagName::parse(tag_name)?;
        let tag = self
            .tag_repo
            .get_by_name(name.as_str())
            .await?
            .ok_or(TaxonomyServiceError::TagNotFound)?;
        if !self.tag_repo.detach(&curriculum.id, &tag.id).await? {
            return Err(TaxonomyServiceError::TagNotFound);
        }
        invalidate_feed(&self.cache).await;
        Ok(())
    }

    pub async fn assign_category(
        &self,
        user: &User,
        curriculum_id: &str,
        category_id: &str,
    ) -> Result<Category, TaxonomyServiceError> {
        let curriculum = self.load_curriculum(user, curriculum_id, true).await?;
        let category = self.load_category(category_id).await?;
        if !category.is_active {
            return Err(ValidationError::new("Category is not active").into());
        }
        self.category_repo.assign(&curriculum.id, &category.id, &user.id).await?;
        invalidate_feed(&self.cache).await;
        tracing::info!(curriculum_id = %curriculum.id, category_id = %category.id, "Category assigned");
        metrics::record(Event::CurriculumCategoryAssignment);
        Ok(category)
    }

    pub async fn unassign_category(&self, user: &User, curriculum_id: &str) -> Result<(), TaxonomyServiceError> {
        let curriculum = self.load_curriculum(user, curriculum_id, true).await?;
        if !self.category_repo.unassign(&curriculum.id).await? {
            return Err(TaxonomyServiceError::CategoryNotFound);
        }
        invalidate_feed(&self.cache).await;
        Ok(())
    }

    pub async fn curriculum_taxonomy(
        &self,
        user: &User,
        curriculum_id: &str,
    ) -> Result<CurriculumTaxonomy, TaxonomyServiceError> {
        let curriculum = self.load_curriculum(user, curriculum_id, false).await?;
        Ok(CurriculumTaxonomy {
            tags: self.tag_repo.tags_for_curriculum(&curriculum.id).await?,
            category: self.category_repo.category_for_curriculum(&curriculum.id).await?,
            curriculum_id: curriculum.id,
        })
    }

    /// Load `ids` as briefs, keeping the order the ids came in
    async fn briefs_in_order(&self, ids: Vec<String>) -> Result<Vec<CurriculumSummary>, TaxonomyServiceError> {
        let mut by_id: HashMap<String, Curriculum> = self
            .curriculum_repo
            .get_by_ids(&ids)
            .await?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();
        Ok(ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .map(|c| CurriculumSummary::from(&c))
            .collect())
    }

    fn viewer(user: &User) -> Option<&str> {
        if user.is_admin() {
            None
        } else {
            Some(user.id.as_str())
        }
    }

    /// Viewable curricula carrying every tag in the comma-separated `tags`
    pub async fn search_by_tags(
        &self,
        user: &User,
        tags: &str,
        params: &ListParams,
    ) -> Result<PagedResult<CurriculumSummary>, TaxonomyServiceError> {
        let raw: Vec<&str> = tags.split(',').collect();
        let names: Vec<String> = TagName::parse_list(&raw)?
            .iter()
            .map(|n| n.as_str().to_string())
            .collect();
        if names.is_empty() {
            return Err(ValidationError::new("At least one tag is required").into());
        }

        let (ids, total) = self
            .tag_repo
            .curriculum_ids_with_all_tags(&names, Self::viewer(user), params)
            .await?;
        Ok(PagedResult::new(self.briefs_in_order(ids).await?, total, params))
    }

    pub async fn search_by_category(
        &self,
        user: &User,
        category_id: &str,
        params: &ListParams,
    ) -> Result<PagedResult<CurriculumSummary>, TaxonomyServiceError> {
        let category = self.load_category(category_id).await?;
        let (ids, total) = self
            .category_repo
            .curriculum_ids_in_category(&category.id, Self::viewer(user), params)
            .await?;
        Ok(PagedResult::new(self.briefs_in_order(ids).await?, total, params))
    }
}
