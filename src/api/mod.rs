//! API layer - HTTP handlers and routing
//!
//! This module contains the JSON endpoints and assembles the full router:
//! - People, group and post query endpoints
//! - Yearly log message endpoint
//! - Poll endpoints (list, detail, results, vote)
//! - HTML views and the admin endpoints, merged from `web` and `admin`

pub mod groups;
pub mod messages;
pub mod middleware;
pub mod people;
pub mod polls;
pub mod posts;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{middleware as axum_middleware, Router};
use tower_http::trace::TraceLayer;

pub use middleware::{cache_control_public, ApiError, ApiJson, ApiQuery, AppState};

/// Build the JSON API router (mounted at `/api`)
pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .nest("/people", people::router())
        .nest("/groups", groups::router())
        .nest("/posts", posts::router())
        .nest("/messages", messages::router())
        .merge(polls::router())
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(crate::web::router())
        .merge(crate::admin::router())
        .nest("/api", build_api_router())
        .fallback(crate::web::not_found)
        // Themed error pages for failed HTML views
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            crate::web::render_error_pages,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
