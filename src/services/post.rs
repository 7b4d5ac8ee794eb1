//! Post service
//!
//! Creating a post assigns its slug: an explicit slug is validated and kept,
//! otherwise one is derived from the title and numbered until it is free.
//! The check-then-insert is retried when the insert still hits the unique
//! index on `slug`.

use crate::db::repositories::{
    is_unique_violation, CategoryRepository, NewPost, PersonRepository, PostRepository,
};
use crate::models::{
    CreatePostInput, Post, PostAuthorEmail, UpdatePostInput, POST_TITLE_MAX_LEN,
};
use crate::services::slug::{base_slug, is_valid_slug, slug_candidates};
use anyhow::Context;
use std::sync::Arc;

/// Fallback base for titles without a single slug character
const SLUG_FALLBACK: &str = "post";

/// Inserts attempted before giving up on a contended slug
const MAX_SLUG_ATTEMPTS: usize = 5;

/// Default size of `recent()`
pub const RECENT_POSTS: i64 = 5;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    /// Post not found
    #[error("Post not found: {0}")]
    NotFound(String),

    /// Author does not exist
    #[error("Author not found: {0}")]
    AuthorNotFound(i64),

    /// Category does not exist
    #[error("Category not found: {0}")]
    CategoryNotFound(i64),

    /// Author already has a post with this title
    #[error("Author already has a post titled: {0}")]
    DuplicateTitle(String),

    /// Explicit slug already in use
    #[error("Post slug already exists: {0}")]
    DuplicateSlug(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Post service
pub struct PostService {
    repo: Arc<dyn PostRepository>,
    people: Arc<dyn PersonRepository>,
    categories: Arc<dyn CategoryRepository>,
}

impl PostService {
    pub fn new(
        repo: Arc<dyn PostRepository>,
        people: Arc<dyn PersonRepository>,
        categories: Arc<dyn CategoryRepository>,
    ) -> Self {
        Self {
            repo,
            people,
            categories,
        }
    }

    /// Create a post and assign its slug
    ///
    /// # Errors
    /// - `ValidationError` for an empty or overlong title, or a malformed slug
    /// - `AuthorNotFound` / `CategoryNotFound` for dangling references
    /// - `DuplicateTitle` if the author already used this title
    /// - `DuplicateSlug` if an explicit slug is taken
    pub async fn create(&self, input: CreatePostInput) -> Result<Post, PostServiceError> {
        let title = input.title.trim().to_string();
        validate_title(&title)?;

        if self
            .people
            .get_by_id(input.author_id)
            .await
            .context("Failed to get author")?
            .is_none()
        {
            return Err(PostServiceError::AuthorNotFound(input.author_id));
        }
        self.ensure_category(input.category_id).await?;

        if self
            .repo
            .author_has_title(input.author_id, &title, None)
            .await
            .context("Failed to check title uniqueness")?
        {
            return Err(PostServiceError::DuplicateTitle(title));
        }

        let explicit_slug = input
            .slug
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        if let Some(slug) = explicit_slug {
            return self.create_with_slug(&title, slug, &input).await;
        }

        let base = base_slug(&title, SLUG_FALLBACK);
        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let slug = self.free_slug(&base).await?;
            let new_post = NewPost {
                title: &title,
                slug: &slug,
                content: &input.content,
                author_id: input.author_id,
                category_id: input.category_id,
            };
            match self.repo.create(&new_post).await {
                Ok(post) => {
                    tracing::debug!("Created post {} with slug '{}'", post.id, post.slug);
                    return Ok(post);
                }
                Err(e) if is_unique_violation(&e) => {
                    tracing::debug!(
                        "Slug '{}' was taken concurrently (attempt {}/{})",
                        slug,
                        attempt,
                        MAX_SLUG_ATTEMPTS
                    );
                    // The author/title index may be the one that fired
                    if self
                        .repo
                        .author_has_title(input.author_id, &title, None)
                        .await
                        .context("Failed to check title uniqueness")?
                    {
                        return Err(PostServiceError::DuplicateTitle(title));
                    }
                }
                Err(e) => return Err(e.context("Failed to create post").into()),
            }
        }

        Err(PostServiceError::InternalError(anyhow::anyhow!(
            "Could not assign a unique slug for '{}' after {} attempts",
            title,
            MAX_SLUG_ATTEMPTS
        )))
    }

    async fn create_with_slug(
        &self,
        title: &str,
        slug: &str,
        input: &CreatePostInput,
    ) -> Result<Post, PostServiceError> {
        if !is_valid_slug(slug) {
            return Err(PostServiceError::ValidationError(format!(
                "Invalid slug: '{}'",
                slug
            )));
        }
        if self
            .repo
            .slug_taken(slug, None)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(PostServiceError::DuplicateSlug(slug.to_string()));
        }

        let new_post = NewPost {
            title,
            slug,
            content: &input.content,
            author_id: input.author_id,
            category_id: input.category_id,
        };
        match self.repo.create(&new_post).await {
            Ok(post) => Ok(post),
            Err(e) if is_unique_violation(&e) => {
                Err(PostServiceError::DuplicateSlug(slug.to_string()))
            }
            Err(e) => Err(e.context("Failed to create post").into()),
        }
    }

    /// First candidate derived from `base` that no post uses
    async fn free_slug(&self, base: &str) -> Result<String, PostServiceError> {
        let mut candidates = slug_candidates(base);
        loop {
            let candidate = candidates
                .next()
                .context("Ran out of slug candidates")?;
            if !self
                .repo
                .slug_taken(&candidate, None)
                .await
                .context("Failed to check slug uniqueness")?
            {
                return Ok(candidate);
            }
        }
    }

    async fn ensure_category(&self, category_id: Option<i64>) -> Result<(), PostServiceError> {
        if let Some(category_id) = category_id {
            if self
                .categories
                .get_by_id(category_id)
                .await
                .context("Failed to get category")?
                .is_none()
            {
                return Err(PostServiceError::CategoryNotFound(category_id));
            }
        }
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Post, PostServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or_else(|| PostServiceError::NotFound(format!("Post with ID {} not found", id)))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Post, PostServiceError> {
        self.repo
            .get_by_slug(slug)
            .await
            .context("Failed to get post by slug")?
            .ok_or_else(|| PostServiceError::NotFound(format!("Post '{}' not found", slug)))
    }

    /// Newest first
    pub async fn recent(&self, limit: i64) -> Result<Vec<Post>, PostServiceError> {
        Ok(self
            .repo
            .recent(limit.max(0))
            .await
            .context("Failed to list recent posts")?)
    }

    /// Posts in the category called `name`, compared case-insensitively
    pub async fn by_category(&self, name: &str) -> Result<Vec<Post>, PostServiceError> {
        Ok(self
            .repo
            .by_category_name(name.trim())
            .await
            .context("Failed to list posts by category")?)
    }

    pub async fn with_author_email(&self) -> Result<Vec<PostAuthorEmail>, PostServiceError> {
        Ok(self
            .repo
            .with_author_email()
            .await
            .context("Failed to list post authors")?)
    }

    pub async fn search(&self, term: &str, limit: i64) -> Result<Vec<Post>, PostServiceError> {
        Ok(self
            .repo
            .search_title(term.trim(), limit)
            .await
            .context("Failed to search posts")?)
    }

    pub async fn list_by_author(&self, author_id: i64) -> Result<Vec<Post>, PostServiceError> {
        Ok(self
            .repo
            .list_by_author(author_id)
            .await
            .context("Failed to list posts by author")?)
    }

    pub async fn count(&self) -> Result<i64, PostServiceError> {
        Ok(self.repo.count().await.context("Failed to count posts")?)
    }

    /// Update title, content or category. The slug stays as assigned.
    pub async fn update(&self, id: i64, input: UpdatePostInput) -> Result<Post, PostServiceError> {
        let mut post = self.get_by_id(id).await?;

        if let Some(title) = input.title {
            let title = title.trim().to_string();
            validate_title(&title)?;
            if title != post.title
                && self
                    .repo
                    .author_has_title(post.author_id, &title, Some(id))
                    .await
                    .context("Failed to check title uniqueness")?
            {
                return Err(PostServiceError::DuplicateTitle(title));
            }
            post.title = title;
        }

        if let Some(content) = input.content {
            post.content = content;
        }

        if let Some(category_id) = input.category_id {
            self.ensure_category(category_id).await?;
            post.category_id = category_id;
        }

        Ok(self.repo.update(&post).await.context("Failed to update post")?)
    }

    pub async fn delete(&self, id: i64) -> Result<(), PostServiceError> {
        let deleted = self.repo.delete(id).await.context("Failed to delete post")?;
        if !deleted {
            return Err(PostServiceError::NotFound(format!("Post with ID {} not found", id)));
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), PostServiceError> {
    if title.is_empty() {
        return Err(PostServiceError::ValidationError(
            "Post title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > POST_TITLE_MAX_LEN {
        return Err(PostServiceError::ValidationError(format!(
            "Post title must be at most {} characters",
            POST_TITLE_MAX_LEN
        )));
    }
    Ok(())
}
