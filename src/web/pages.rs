//! Home, about and current time pages

use axum::{
    extract::State,
    http::header,
    response::{Html, IntoResponse, Response},
};
use chrono::{Datelike, Local, Utc};
use std::time::Duration;
use tera::Context as TeraContext;

use crate::api::{cache_control_public, AppState};
use crate::cache::CacheLayer;
use crate::services::log_message::{HOME_MESSAGES, RECENT_MESSAGES};
use crate::web::{render, Flash, PageError};

/// How long the rendered `/now/` page is reused
pub const NOW_PAGE_TTL: Duration = Duration::from_secs(15 * 60);

const NOW_PAGE_CACHE_KEY: &str = "page:current_datetime";

const ABOUT_FEATURES: &[&str] = &[
    "List and detail views",
    "Template inheritance",
    "URL routing with custom path converters",
    "Form handling with validation",
    "Flash messages",
    "Error pages",
    "Page caching",
    "A small JSON API",
];

/// GET /
pub async fn home(State(state): State<AppState>, flash: Flash) -> Result<Response, PageError> {
    let service = &state.log_message_service;
    let message_list = service.recent(HOME_MESSAGES).await?;
    let recent_messages = service.recent(RECENT_MESSAGES).await?;
    let total_messages = service.count().await?;
    let now = Utc::now();

    let mut context = TeraContext::new();
    context.insert("message_list", &message_list);
    context.insert("recent_messages", &recent_messages);
    context.insert("total_messages", &total_messages);
    context.insert("current_year", &now.year());
    context.insert("current_month", &now.month());
    render(&state, &flash, "polls/home.html", context)
}

/// GET /about/
pub async fn about(State(state): State<AppState>, flash: Flash) -> Result<Response, PageError> {
    let mut context = TeraContext::new();
    context.insert("title", "About Our Application");
    context.insert(
        "description",
        "This application demonstrates views, templates, URLs, and forms.",
    );
    context.insert("features", ABOUT_FEATURES);
    render(&state, &flash, "polls/about.html", context)
}

/// GET /now/
///
/// The rendered page is cached, so the shown time can be up to
/// `NOW_PAGE_TTL` old.
pub async fn current_datetime(State(state): State<AppState>) -> Result<Response, PageError> {
    let cached: Option<String> = state.cache.get(NOW_PAGE_CACHE_KEY).await.ok().flatten();
    let html = match cached {
        Some(html) => html,
        None => {
            let mut context = TeraContext::new();
            context.insert("site_title", &state.config.site.title);
            context.insert("flash_messages", &Vec::<()>::new());
            context.insert(
                "now",
                &Local::now().format("%A, %B %d, %Y at %I:%M:%S %p").to_string(),
            );
            let html = state
                .templates
                .render("polls/now.html", &context)
                .map_err(|e| PageError::Internal(e.to_string()))?;

            if let Err(e) = state.cache.set(NOW_PAGE_CACHE_KEY, &html, NOW_PAGE_TTL).await {
                tracing::warn!("Failed to cache current time page: {}", e);
            }
            html
        }
    };

    Ok((
        [(header::CACHE_CONTROL, cache_control_public(NOW_PAGE_TTL.as_secs() as u32))],
        Html(html),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{app, body_text, get, get_with_cookie, test_state};
    use crate::web::flash::{set_cookie, FlashMessage};
    use axum::http::{header, StatusCode};

    #[tokio::test]
    async fn test_home_lists_latest_messages() {
        let state = test_state().await;
        for i in 1..=7 {
            state
                .log_message_service
                .log(&format!("Message number {}", i))
                .await
                .unwrap();
        }

        let response = get(app(&state), "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Message number 7"));
        assert!(html.contains("Message number 3"));
        assert!(!html.contains("Message number 2<"));
        assert!(html.contains("7 messages logged"));
    }

    #[tokio::test]
    async fn test_home_shows_and_clears_flash() {
        let state = test_state().await;
        let cookie = set_cookie(&[FlashMessage::success("It worked!")]);
        let cookie = cookie.split(';').next().unwrap().to_string();

        let response = get_with_cookie(app(&state), "/", &cookie).await;
        assert_eq!(response.status(), StatusCode::OK);
        let set = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(set.contains("Max-Age=0"));
        assert!(body_text(response).await.contains("It worked!"));
    }

    #[tokio::test]
    async fn test_about_lists_features() {
        let state = test_state().await;
        let html = body_text(get(app(&state), "/about/").await).await;
        assert!(html.contains("About Our Application"));
        assert!(html.contains("URL routing with custom path converters"));
    }

    #[tokio::test]
    async fn test_now_page_is_cached() {
        let state = test_state().await;
        let first = get(app(&state), "/now/").await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(
            first.headers().get(header::CACHE_CONTROL).unwrap(),
            "public, max-age=900"
        );
        let first = body_text(first).await;
        assert!(first.contains("Current Date and Time"));

        let second = body_text(get(app(&state), "/now/").await).await;
        assert_eq!(first, second);
    }
}
