//! Post API endpoints
//!
//! - GET /api/posts/recent?limit= - Newest posts
//! - GET /api/posts/by-category?name= - Posts in a category, any case
//! - GET /api/posts/authors - Title and author email pairs

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, ApiQuery, AppState};
use crate::models::{Post, PostAuthorEmail};
use crate::services::post::RECENT_POSTS;

/// Upper bound for `?limit=`
const MAX_RECENT: i64 = 50;

/// Create the posts router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/recent", get(recent_posts))
        .route("/by-category", get(posts_by_category))
        .route("/authors", get(post_authors))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostsResponse {
    pub count: usize,
    pub results: Vec<Post>,
}

#[derive(Debug, Serialize)]
pub struct AuthorsResponse {
    pub results: Vec<PostAuthorEmail>,
}

/// GET /api/posts/recent
async fn recent_posts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RecentQuery>,
) -> Result<Json<PostsResponse>, ApiError> {
    let limit = match query.limit.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| ApiError::validation_error("Limit must be integer"))?,
        None => RECENT_POSTS,
    };
    let limit = limit.clamp(1, MAX_RECENT);
    let results = state.post_service.recent(limit).await?;
    Ok(Json(PostsResponse {
        count: results.len(),
        results,
    }))
}

/// GET /api/posts/by-category
async fn posts_by_category(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> Result<Json<PostsResponse>, ApiError> {
    let name = query
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::validation_error("Missing name param"))?;

    let results = state.post_service.by_category(name.trim()).await?;
    Ok(Json(PostsResponse {
        count: results.len(),
        results,
    }))
}

/// GET /api/posts/authors
async fn post_authors(State(state): State<AppState>) -> Result<Json<AuthorsResponse>, ApiError> {
    let results = state.post_service.with_author_email().await?;
    Ok(Json(AuthorsResponse { results }))
}
