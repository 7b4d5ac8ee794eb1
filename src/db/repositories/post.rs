//! Post repository
//!
//! Slug assignment happens in the service layer; this repository only
//! stores what it is given and reports slug collisions.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Post, PostAuthorEmail};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use super::{bind_mysql, bind_sqlite, contains_pattern, Bind};

/// A post ready to be inserted, slug already resolved
#[derive(Debug, Clone)]
pub struct NewPost<'a> {
    pub title: &'a str,
    pub slug: &'a str,
    pub content: &'a str,
    pub author_id: i64,
    pub category_id: Option<i64>,
}

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: &NewPost<'_>) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    /// Whether a post other than `exclude_id` already uses `slug`
    async fn slug_taken(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Whether the author already has a post with this title
    async fn author_has_title(&self, author_id: i64, title: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Newest first
    async fn recent(&self, limit: i64) -> Result<Vec<Post>>;

    /// Posts whose category name equals `name`, ignoring case; newest first
    async fn by_category_name(&self, name: &str) -> Result<Vec<Post>>;

    /// Title and author email for every post, newest first
    async fn with_author_email(&self) -> Result<Vec<PostAuthorEmail>>;

    /// Case-insensitive title search, newest first
    async fn search_title(&self, term: &str, limit: i64) -> Result<Vec<Post>>;

    async fn list_by_author(&self, author_id: i64) -> Result<Vec<Post>>;

    async fn count(&self) -> Result<i64>;

    /// Update title, content and category; the slug is never regenerated
    async fn update(&self, post: &Post) -> Result<Post>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based post repository
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_posts(&self, sql: &str, binds: &[Bind]) -> Result<Vec<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = bind_sqlite(sqlx::query(sql), binds)
                    .fetch_all(self.pool.sqlite()?)
                    .await?;
                Ok(rows.iter().map(row_to_post_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = bind_mysql(sqlx::query(sql), binds)
                    .fetch_all(self.pool.mysql()?)
                    .await?;
                Ok(rows.iter().map(row_to_post_mysql).collect())
            }
        }
    }

    async fn fetch_post(&self, sql: &str, binds: &[Bind]) -> Result<Option<Post>> {
        Ok(self.fetch_posts(sql, binds).await?.into_iter().next())
    }

    async fn count_where(&self, sql: &str, binds: &[Bind]) -> Result<i64> {
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                bind_sqlite(sqlx::query(sql), binds)
                    .fetch_one(self.pool.sqlite()?)
                    .await?
                    .get(0)
            }
            DatabaseDriver::Mysql => {
                bind_mysql(sqlx::query(sql), binds)
                    .fetch_one(self.pool.mysql()?)
                    .await?
                    .get(0)
            }
        };
        Ok(count)
    }
}

const POST_COLUMNS: &str =
    "po.id, po.title, po.slug, po.content, po.author_id, po.category_id, po.created_at, po.updated_at";

fn select_posts(tail: &str) -> String {
    format!("SELECT {} FROM polls_post po {}", POST_COLUMNS, tail)
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &NewPost<'_>) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(self.pool.sqlite()?, post).await,
            DatabaseDriver::Mysql => create_post_mysql(self.pool.mysql()?, post).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        self.fetch_post(&select_posts("WHERE po.id = ?"), &[Bind::Int(id)])
            .await
            .context("Failed to get post by ID")
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        self.fetch_post(
            &select_posts("WHERE po.slug = ?"),
            &[Bind::Text(slug.to_string())],
        )
        .await
        .context("Failed to get post by slug")
    }

    async fn slug_taken(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count = self
            .count_where(
                "SELECT COUNT(*) FROM polls_post WHERE slug = ? AND id <> ?",
                &[Bind::Text(slug.to_string()), Bind::Int(exclude_id.unwrap_or(0))],
            )
            .await
            .context("Failed to check post slug")?;
        Ok(count > 0)
    }

    async fn author_has_title(&self, author_id: i64, title: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count = self
            .count_where(
                "SELECT COUNT(*) FROM polls_post WHERE author_id = ? AND title = ? AND id <> ?",
                &[
                    Bind::Int(author_id),
                    Bind::Text(title.to_string()),
                    Bind::Int(exclude_id.unwrap_or(0)),
                ],
            )
            .await
            .context("Failed to check post title")?;
        Ok(count > 0)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<Post>> {
        self.fetch_posts(
            &select_posts("ORDER BY po.created_at DESC, po.id DESC LIMIT ?"),
            &[Bind::Int(limit)],
        )
        .await
        .context("Failed to list recent posts")
    }

    async fn by_category_name(&self, name: &str) -> Result<Vec<Post>> {
        self.fetch_posts(
            &select_posts(
                "JOIN polls_category c ON c.id = po.category_id \
                 WHERE LOWER(c.name) = LOWER(?) ORDER BY po.created_at DESC, po.id DESC",
            ),
            &[Bind::Text(name.to_string())],
        )
        .await
        .context("Failed to list posts by category")
    }

    async fn with_author_email(&self) -> Result<Vec<PostAuthorEmail>> {
        let sql = r#"
            SELECT po.title AS title, pe.email AS author_email
            FROM polls_post po
            JOIN polls_person pe ON pe.id = po.author_id
            ORDER BY po.created_at DESC, po.id DESC
        "#;
        let pairs = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list post authors")?
                .iter()
                .map(|row| PostAuthorEmail {
                    title: row.get("title"),
                    author_email: row.get("author_email"),
                })
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list post authors")?
                .iter()
                .map(|row| PostAuthorEmail {
                    title: row.get("title"),
                    author_email: row.get("author_email"),
                })
                .collect(),
        };
        Ok(pairs)
    }

    async fn search_title(&self, term: &str, limit: i64) -> Result<Vec<Post>> {
        self.fetch_posts(
            &select_posts(
                "WHERE LOWER(po.title) LIKE ? ESCAPE '!' ORDER BY po.created_at DESC, po.id DESC LIMIT ?",
            ),
            &[Bind::Text(contains_pattern(term)), Bind::Int(limit)],
        )
        .await
        .context("Failed to search posts")
    }

    async fn list_by_author(&self, author_id: i64) -> Result<Vec<Post>> {
        self.fetch_posts(
            &select_posts("WHERE po.author_id = ? ORDER BY po.created_at DESC, po.id DESC"),
            &[Bind::Int(author_id)],
        )
        .await
        .context("Failed to list posts by author")
    }

    async fn count(&self) -> Result<i64> {
        self.count_where("SELECT COUNT(*) FROM polls_post", &[])
            .await
            .context("Failed to count posts")
    }

    async fn update(&self, post: &Post) -> Result<Post> {
        let now = Utc::now();
        let sql = "UPDATE polls_post SET title = ?, content = ?, category_id = ?, updated_at = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&post.title)
                    .bind(&post.content)
                    .bind(post.category_id)
                    .bind(now)
                    .bind(post.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update post")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(&post.title)
                    .bind(&post.content)
                    .bind(post.category_id)
                    .bind(now)
                    .bind(post.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update post")?;
            }
        }
        Ok(Post {
            updated_at: now,
            ..post.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM polls_post WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

const INSERT_POST: &str = r#"
    INSERT INTO polls_post (title, slug, content, author_id, category_id, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
"#;

fn post_from_new(id: i64, post: &NewPost<'_>, now: DateTime<Utc>) -> Post {
    Post {
        id,
        title: post.title.to_string(),
        slug: post.slug.to_string(),
        content: post.content.to_string(),
        author_id: post.author_id,
        category_id: post.category_id,
        created_at: now,
        updated_at: now,
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &NewPost<'_>) -> Result<Post> {
    let now = Utc::now();

    let result = sqlx::query(INSERT_POST)
        .bind(post.title)
        .bind(post.slug)
        .bind(post.content)
        .bind(post.author_id)
        .bind(post.category_id)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create post")?;

    Ok(post_from_new(result.last_insert_rowid(), post, now))
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        content: row.get("content"),
        author_id: row.get("author_id"),
        category_id: row.get("category_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, post: &NewPost<'_>) -> Result<Post> {
    let now = Utc::now();

    let result = sqlx::query(INSERT_POST)
        .bind(post.title)
        .bind(post.slug)
        .bind(post.content)
        .bind(post.author_id)
        .bind(post.category_id)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create post")?;

    Ok(post_from_new(result.last_insert_id() as i64, post, now))
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Post {
    Post {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        content: row.get("content"),
        author_id: row.get("author_id"),
        category_id: row.get("category_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
