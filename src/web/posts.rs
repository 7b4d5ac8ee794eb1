//! Post detail view

use axum::{
    extract::{Path, State},
    response::Response,
};
use tera::Context as TeraContext;

use crate::api::AppState;
use crate::services::slug::is_valid_slug;
use crate::web::{render, Flash, PageError};

/// GET /posts/{slug}/
pub async fn post_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    flash: Flash,
) -> Result<Response, PageError> {
    if !is_valid_slug(&slug) {
        return Err(PageError::NotFound(format!("No post found with slug: {}", slug)));
    }

    let post = state.post_service.get_by_slug(&slug).await?;
    let author = state.person_service.get_by_id(post.author_id).await?;
    let category = match post.category_id {
        Some(id) => state.category_service.get_by_id(id).await?,
        None => None,
    };

    let mut context = TeraContext::new();
    context.insert("post", &post);
    context.insert("author_name", &author.full_name());
    context.insert("category", &category);
    render(&state, &flash, "polls/post_detail.html", context)
}
