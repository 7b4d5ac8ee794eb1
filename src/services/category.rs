//! Category service
//!
//! Categories change rarely and are read on every post listing, so lookups
//! go through the cache. Any write drops every `category:*` entry.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CreateCategoryInput, UpdateCategoryInput};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

/// Maximum length of a category name
pub const CATEGORY_NAME_MAX_LEN: usize = 100;

/// Cache key prefixes
const CACHE_KEY_CATEGORY_BY_ID: &str = "category:id:";
const CACHE_KEY_CATEGORY_LIST: &str = "category:list";
const CACHE_PATTERN_ALL: &str = "category:*";

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    /// Category name already exists
    #[error("Category name already exists: {0}")]
    DuplicateName(String),

    /// Category not found
    #[error("Category not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Category service
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: Arc<MemoryCache>,
    cache_ttl: Duration,
}

impl CategoryService {
    /// Create a category service using the cache's default TTL
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: Arc<MemoryCache>) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            repo,
            cache,
            cache_ttl,
        }
    }

    /// Create a category service with a custom cache TTL
    pub fn with_cache_ttl(
        repo: Arc<dyn CategoryRepository>,
        cache: Arc<MemoryCache>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            cache,
            cache_ttl,
        }
    }

    /// Create a new category
    ///
    /// # Errors
    /// - `ValidationError` if the name is empty or too long
    /// - `DuplicateName` if the name is taken, ignoring case
    pub async fn create(
        &self,
        input: CreateCategoryInput,
    ) -> Result<Category, CategoryServiceError> {
        let name = validate_name(&input.name)?;

        if self
            .repo
            .get_by_name(&name)
            .await
            .context("Failed to check name uniqueness")?
            .is_some()
        {
            return Err(CategoryServiceError::DuplicateName(name));
        }

        let created = self
            .repo
            .create(&CreateCategoryInput {
                name,
                description: input.description.trim().to_string(),
            })
            .await
            .context("Failed to create category")?;

        self.invalidate_cache().await;
        Ok(created)
    }

    /// Get category by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Category>, CategoryServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_CATEGORY_BY_ID, id);
        if let Some(category) = self.cache.get::<Category>(&cache_key).await.ok().flatten() {
            return Ok(Some(category));
        }

        let category = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get category by ID")?;

        if let Some(ref cat) = category {
            let _ = self.cache.set(&cache_key, cat, self.cache_ttl).await;
        }

        Ok(category)
    }

    /// Get category by name, ignoring case
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Category>, CategoryServiceError> {
        Ok(self
            .repo
            .get_by_name(name.trim())
            .await
            .context("Failed to get category by name")?)
    }

    /// All categories ordered by name
    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        if let Some(list) = self
            .cache
            .get::<Vec<Category>>(CACHE_KEY_CATEGORY_LIST)
            .await
            .ok()
            .flatten()
        {
            return Ok(list);
        }

        let list = self.repo.list().await.context("Failed to list categories")?;
        let _ = self
            .cache
            .set(CACHE_KEY_CATEGORY_LIST, &list, self.cache_ttl)
            .await;

        Ok(list)
    }

    /// Update a category
    ///
    /// # Errors
    /// - `NotFound` if the category doesn't exist
    /// - `DuplicateName` if another category already has the new name
    pub async fn update(
        &self,
        id: i64,
        input: UpdateCategoryInput,
    ) -> Result<Category, CategoryServiceError> {
        let mut category = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
            .ok_or_else(|| {
                CategoryServiceError::NotFound(format!("Category with ID {} not found", id))
            })?;

        if let Some(ref new_name) = input.name {
            let new_name = validate_name(new_name)?;
            if new_name != category.name {
                let existing = self
                    .repo
                    .get_by_name(&new_name)
                    .await
                    .context("Failed to check name uniqueness")?;
                if existing.is_some_and(|other| other.id != id) {
                    return Err(CategoryServiceError::DuplicateName(new_name));
                }
                category.name = new_name;
            }
        }

        if let Some(ref description) = input.description {
            category.description = description.trim().to_string();
        }

        let updated = self
            .repo
            .update(&category)
            .await
            .context("Failed to update category")?;

        self.invalidate_cache().await;
        Ok(updated)
    }

    /// Delete a category. Its posts stay, with no category.
    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        let deleted = self
            .repo
            .delete(id)
            .await
            .context("Failed to delete category")?;
        if !deleted {
            return Err(CategoryServiceError::NotFound(format!(
                "Category with ID {} not found",
                id
            )));
        }

        self.invalidate_cache().await;
        Ok(())
    }

    async fn invalidate_cache(&self) {
        if let Err(e) = self.cache.delete_pattern(CACHE_PATTERN_ALL).await {
            tracing::warn!("Failed to invalidate category cache: {}", e);
        }
    }
}

fn validate_name(name: &str) -> Result<String, CategoryServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CategoryServiceError::ValidationError(
            "Category name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > CATEGORY_NAME_MAX_LEN {
        return Err(CategoryServiceError::ValidationError(format!(
            "Category name must be at most {} characters",
            CATEGORY_NAME_MAX_LEN
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::SqlxCategoryRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> (Arc<MemoryCache>, CategoryService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let repo = SqlxCategoryRepository::boxed(pool);
        let cache = create_cache(&CacheConfig::default());
        let service = CategoryService::new(repo, cache.clone());

        (cache, service)
    }

    #[tokio::test]
    async fn test_create_and_list_sorted() {
        let (_, service) = setup_test_service().await;
        service.create(CreateCategoryInput::new("Rust")).await.unwrap();
        service.create(CreateCategoryInput::new("Django")).await.unwrap();

        let names: Vec<String> = service
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Django", "Rust"]);
    }

    #[tokio::test]
    async fn test_duplicate_name_ignores_case() {
        let (_, service) = setup_test_service().await;
        service.create(CreateCategoryInput::new("Django")).await.unwrap();

        let result = service.create(CreateCategoryInput::new("  DJANGO ")).await;
        assert!(matches!(result, Err(CategoryServiceError::DuplicateName(_))));
    }

    #[tokio::test]
    async fn test_empty_and_long_names_rejected() {
        let (_, service) = setup_test_service().await;
        let empty = service.create(CreateCategoryInput::new("   ")).await;
        assert!(matches!(empty, Err(CategoryServiceError::ValidationError(_))));

        let long = service
            .create(CreateCategoryInput::new("x".repeat(CATEGORY_NAME_MAX_LEN + 1)))
            .await;
        assert!(matches!(long, Err(CategoryServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_list_is_cached_and_invalidated() {
        let (cache, service) = setup_test_service().await;
        service.create(CreateCategoryInput::new("Django")).await.unwrap();

        assert_eq!(service.list().await.unwrap().len(), 1);
        let cached: Option<Vec<Category>> = cache.get(CACHE_KEY_CATEGORY_LIST).await.unwrap();
        assert_eq!(cached.map(|list| list.len()), Some(1));

        service.create(CreateCategoryInput::new("Rust")).await.unwrap();
        let cached: Option<Vec<Category>> = cache.get(CACHE_KEY_CATEGORY_LIST).await.unwrap();
        assert!(cached.is_none());
        assert_eq!(service.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (_, service) = setup_test_service().await;
        let django = service.create(CreateCategoryInput::new("Django")).await.unwrap();
        service.create(CreateCategoryInput::new("Rust")).await.unwrap();

        // Warm the by-id cache so the update has to invalidate it
        service.get_by_id(django.id).await.unwrap();

        let updated = service
            .update(
                django.id,
                UpdateCategoryInput {
                    name: Some("Web".to_string()),
                    description: Some("Frameworks".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Web");
        assert_eq!(
            service.get_by_id(django.id).await.unwrap().map(|c| c.name),
            Some("Web".to_string())
        );

        let clash = service
            .update(
                django.id,
                UpdateCategoryInput {
                    name: Some("rust".to_string()),
                    description: None,
                },
            )
            .await;
        assert!(matches!(clash, Err(CategoryServiceError::DuplicateName(_))));

        service.delete(django.id).await.unwrap();
        assert!(service.get_by_id(django.id).await.unwrap().is_none());
        assert!(matches!(
            service.delete(django.id).await,
            Err(CategoryServiceError::NotFound(_))
        ));
    }
}
