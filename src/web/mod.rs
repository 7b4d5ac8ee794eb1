//! Server-rendered HTML views
//!
//! Every page extends `polls/base.html`. Views return `Result<Response,
//! PageError>`; `render_error_pages` turns a `PageError` into the themed
//! error page once the handler has finished.

pub mod contact;
pub mod flash;
pub mod messages;
pub mod pages;
pub mod posts;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tera::Context as TeraContext;

use crate::api::AppState;
use crate::services::{
    CategoryServiceError, LogMessageServiceError, PersonServiceError, PostServiceError,
};
use crate::urls;

pub use flash::{Flash, FlashMessage};

/// Create the HTML views router
pub fn router() -> Router<AppState> {
    Router::new()
        .route(urls::HOME, get(pages::home))
        .route(urls::ABOUT, get(pages::about))
        .route(urls::CURRENT_DATETIME, get(pages::current_datetime))
        .route(urls::LOG, get(messages::log_form).post(messages::log_submit))
        .route(urls::MESSAGE_LIST, get(messages::message_list))
        .route(urls::YEARLY_ARCHIVE, get(messages::yearly_archive))
        .route(urls::MONTHLY_ARCHIVE, get(messages::monthly_archive))
        .route(urls::SEARCH, get(messages::search))
        .route(urls::CONTACT, get(contact::contact_form).post(contact::contact_submit))
        .route(urls::POST_DETAIL, get(posts::post_detail))
}

/// Error raised by an HTML view
#[derive(Debug, Clone, thiserror::Error)]
pub enum PageError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

/// Marker left on the response for `render_error_pages`
#[derive(Debug, Clone)]
struct ErrorPage {
    status: StatusCode,
    message: String,
}

impl PageError {
    pub fn status(&self) -> StatusCode {
        match self {
            PageError::NotFound(_) => StatusCode::NOT_FOUND,
            PageError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            PageError::NotFound(message) => message,
            PageError::Internal(cause) => {
                tracing::error!("Page failed: {}", cause);
                "Something went wrong on our side.".to_string()
            }
        };

        let mut response = (status, message.clone()).into_response();
        response.extensions_mut().insert(ErrorPage { status, message });
        response
    }
}

impl From<LogMessageServiceError> for PageError {
    fn from(err: LogMessageServiceError) -> Self {
        match err {
            LogMessageServiceError::NotFound(_) => PageError::NotFound(err.to_string()),
            other => PageError::Internal(format!("{:#}", other)),
        }
    }
}

impl From<PostServiceError> for PageError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::NotFound(_) => PageError::NotFound(err.to_string()),
            other => PageError::Internal(format!("{:#}", other)),
        }
    }
}

impl From<PersonServiceError> for PageError {
    fn from(err: PersonServiceError) -> Self {
        match err {
            PersonServiceError::NotFound(_) => PageError::NotFound(err.to_string()),
            other => PageError::Internal(format!("{:#}", other)),
        }
    }
}

impl From<CategoryServiceError> for PageError {
    fn from(err: CategoryServiceError) -> Self {
        match err {
            CategoryServiceError::NotFound(_) => PageError::NotFound(err.to_string()),
            other => PageError::Internal(format!("{:#}", other)),
        }
    }
}

/// Replace the plain body of a failed view with the rendered error page
pub async fn render_error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    let Some(page) = response.extensions().get::<ErrorPage>().cloned() else {
        return response;
    };

    let html = state
        .templates
        .error_page(&state.config.site.title, page.status.as_u16(), &page.message);
    (page.status, Html(html)).into_response()
}

/// Fallback for unknown paths
pub async fn not_found() -> PageError {
    PageError::NotFound("The requested page does not exist.".to_string())
}

/// Render `template` with the site-wide variables; consumes the flash
pub(crate) fn render(
    state: &AppState,
    flash: &Flash,
    template: &str,
    mut context: TeraContext,
) -> Result<Response, PageError> {
    context.insert("site_title", &state.config.site.title);
    context.insert("flash_messages", &flash.0);

    let html = state
        .templates
        .render(template, &context)
        .map_err(|e| PageError::Internal(e.to_string()))?;

    if flash.is_empty() {
        Ok(Html(html).into_response())
    } else {
        Ok(([(header::SET_COOKIE, flash::clear_cookie())], Html(html)).into_response())
    }
}
