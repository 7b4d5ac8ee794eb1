//! Post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a post slug
pub const POST_SLUG_MAX_LEN: usize = 80;

/// Maximum length of a post title
pub const POST_TITLE_MAX_LEN: usize = 255;

/// A post written by a person, optionally filed under a category.
///
/// Slugs are unique across all posts and `(author_id, title)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Display for Post {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.title)
    }
}

/// Title and author email pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostAuthorEmail {
    pub title: String,
    pub author_email: String,
}

/// Input for creating a post.
///
/// When `slug` is `None` or empty a unique slug is derived from the title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    pub content: String,
    pub author_id: i64,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub slug: Option<String>,
}

impl CreatePostInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>, author_id: i64) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            author_id,
            category_id: None,
            slug: None,
        }
    }

    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }
}

/// Input for updating a post. The slug never changes once assigned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub content: Option<String>,
    /// `Some(None)` clears the category
    #[serde(default)]
    pub category_id: Option<Option<i64>>,
}
