//! Log message views: the log form, the paginated list, the archives and
//! the search page

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tera::Context as TeraContext;

use crate::api::AppState;
use crate::converters::{IntConverter, PathConverter, YearConverter};
use crate::models::{ListParams, LogMessage, PagedResult};
use crate::services::forms::{FormErrors, LogMessageForm, SearchForm};
use crate::services::log_message::{LogMessageServiceError, RECENT_MESSAGES};
use crate::services::period::month_name;
use crate::urls;
use crate::web::flash::{self, FlashMessage};
use crate::web::{render, Flash, PageError};

/// Maximum number of results per kind on the search page
const SEARCH_LIMIT: i64 = 50;

const FORM_ERROR_FLASH: &str = "Please correct the errors below.";

/// GET /log/
pub async fn log_form(State(state): State<AppState>, flash: Flash) -> Result<Response, PageError> {
    log_page(&state, flash, LogMessageForm::default(), FormErrors::new()).await
}

/// POST /log/
///
/// Saves the cleaned message and redirects home, or re-renders the form
/// with its errors.
pub async fn log_submit(
    State(state): State<AppState>,
    Form(form): Form<LogMessageForm>,
) -> Result<Response, PageError> {
    let message = match form.clean() {
        Ok(message) => message,
        Err(errors) => return log_page(&state, form_error_flash(), form, errors).await,
    };

    match state.log_message_service.log(&message).await {
        Ok(_) => {}
        Err(LogMessageServiceError::ValidationError(msg)) => {
            let mut errors = FormErrors::new();
            errors.add("message", msg);
            return log_page(&state, form_error_flash(), form, errors).await;
        }
        Err(e) => return Err(e.into()),
    }

    let cookie = flash::set_cookie(&[FlashMessage::success(
        "Your message has been logged successfully!",
    )]);
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(urls::HOME)).into_response())
}

fn form_error_flash() -> Flash {
    Flash(vec![FlashMessage::error(FORM_ERROR_FLASH)])
}

async fn log_page(
    state: &AppState,
    flash: Flash,
    form: LogMessageForm,
    errors: FormErrors,
) -> Result<Response, PageError> {
    let recent_messages = state.log_message_service.recent(RECENT_MESSAGES).await?;

    let mut context = TeraContext::new();
    context.insert("form", &form);
    context.insert("errors", &errors);
    context.insert("recent_messages", &recent_messages);
    render(state, &flash, "polls/log_message.html", context)
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// GET /messages/?page=
///
/// Anything but a positive page number shows the first page; a page past
/// the end shows the last one.
pub async fn message_list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    flash: Flash,
) -> Result<Response, PageError> {
    let params = ListParams::from_query(query.page.as_deref(), state.config.site.page_size);
    let page = state.log_message_service.paginated(params).await?;

    let mut context = TeraContext::new();
    context.insert("total_count", &page.total);
    context.insert("page_obj", &PageContext::from(&page));
    context.insert("messages", &page.items);
    render(&state, &flash, "polls/message_list.html", context)
}

/// Pagination values the template needs
#[derive(Debug, Serialize)]
struct PageContext {
    number: u32,
    num_pages: u32,
    has_previous: bool,
    has_next: bool,
    previous_page_number: u32,
    next_page_number: u32,
}

impl From<&PagedResult<LogMessage>> for PageContext {
    fn from(page: &PagedResult<LogMessage>) -> Self {
        Self {
            number: page.page,
            num_pages: page.total_pages(),
            has_previous: page.has_prev(),
            has_next: page.has_next(),
            previous_page_number: page.page.saturating_sub(1).max(1),
            next_page_number: (page.page + 1).min(page.total_pages()),
        }
    }
}

/// GET /archive/{yyyy}/
pub async fn yearly_archive(
    State(state): State<AppState>,
    Path(year): Path<String>,
    flash: Flash,
) -> Result<Response, PageError> {
    let year = YearConverter::to_value(&year)
        .ok_or_else(|| PageError::NotFound(format!("No such year: {}", year)))?;

    let messages = state.log_message_service.for_year(year).await?;
    if messages.is_empty() {
        return Err(PageError::NotFound(format!(
            "No messages found for year {}",
            year
        )));
    }

    let mut context = TeraContext::new();
    context.insert("year", &year);
    context.insert("count", &messages.len());
    context.insert("messages", &messages);
    render(&state, &flash, "polls/yearly_archive.html", context)
}

/// GET /archive/{yyyy}/{month}/
pub async fn monthly_archive(
    State(state): State<AppState>,
    Path((year, month)): Path<(String, String)>,
    flash: Flash,
) -> Result<Response, PageError> {
    let not_found = || PageError::NotFound(format!("No such month: {}/{}", month, year));
    let year_value = YearConverter::to_value(&year).ok_or_else(not_found)?;
    let month_value = IntConverter::to_value(&month).ok_or_else(not_found)?;
    let name = month_name(month_value).ok_or_else(not_found)?;

    let messages = state
        .log_message_service
        .for_month(year_value, month_value)
        .await?;
    if messages.is_empty() {
        return Err(PageError::NotFound(format!(
            "No messages found for {}/{}",
            month_value, year_value
        )));
    }

    let mut context = TeraContext::new();
    context.insert("year", &year_value);
    context.insert("month", &month_value);
    context.insert("month_name", name);
    context.insert("count", &messages.len());
    context.insert("messages", &messages);
    render(&state, &flash, "polls/monthly_archive.html", context)
}

/// GET /search/?q=
///
/// Without a query the empty form is shown; otherwise messages and post
/// titles are searched.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    flash: Flash,
) -> Result<Response, PageError> {
    let raw = params.get("q").or_else(|| params.get("query"));
    let submitted = raw.is_some();
    let form = SearchForm::new(raw.cloned().unwrap_or_default());

    let mut context = TeraContext::new();
    context.insert("form", &form);
    context.insert("searched", &false);

    let mut flash = flash;
    let mut errors = FormErrors::new();
    if submitted {
        match form.clean() {
            Ok(query) => {
                let message_results = state
                    .log_message_service
                    .search(&query, SEARCH_LIMIT)
                    .await?;
                let post_results = state.post_service.search(&query, SEARCH_LIMIT).await?;

                context.insert("searched", &true);
                context.insert("query", &query);
                context.insert("message_results", &message_results);
                context.insert("post_results", &post_results);
            }
            Err(form_errors) => {
                errors = form_errors;
                flash.0.push(FlashMessage::error(FORM_ERROR_FLASH));
            }
        }
    }
    context.insert("errors", &errors);

    render(&state, &flash, "polls/search.html", context)
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{app, body_text, get, post_form, test_state};
    use axum::http::{header, StatusCode};
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_log_form_renders() {
        let state = test_state().await;
        let response = get(app(&state), "/log/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("<form"));
        assert!(html.contains(r#"name="message""#));
    }

    #[tokio::test]
    async fn test_log_submit_saves_and_redirects() {
        let state = test_state().await;
        let response = post_form(
            app(&state),
            "/log/",
            "message=%3Cb%3EHello%3C%2Fb%3E+++there%2C+world",
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
        assert!(response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("polls_flash="));

        let saved = state.log_message_service.recent(1).await.unwrap();
        assert_eq!(saved[0].message, "Hello there, world");
    }

    #[tokio::test]
    async fn test_log_submit_shows_errors() {
        let state = test_state().await;
        let response = post_form(app(&state), "/log/", "message=buy+spam+now").await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Message contains inappropriate content."));
        assert!(html.contains("Please correct the errors below."));
        assert_eq!(state.log_message_service.count().await.unwrap(), 0);

        let short = body_text(post_form(app(&state), "/log/", "message=hi").await).await;
        assert!(short.contains("Message must be at least 5 characters long."));
    }

    #[tokio::test]
    async fn test_message_list_pagination() {
        let state = test_state().await;
        for day in 1..=12 {
            state
                .log_message_service
                .log_at(
                    &format!("Entry {:02}", day),
                    Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap(),
                )
                .await
                .unwrap();
        }

        let first = body_text(get(app(&state), "/messages/").await).await;
        assert!(first.contains("Entry 12"));
        assert!(!first.contains("Entry 02"));
        assert!(first.contains("Page 1 of 2"));

        let last = body_text(get(app(&state), "/messages/?page=99").await).await;
        assert!(last.contains("Page 2 of 2"));
        assert!(last.contains("Entry 01"));

        let junk = body_text(get(app(&state), "/messages/?page=abc").await).await;
        assert!(junk.contains("Page 1 of 2"));
    }

    #[tokio::test]
    async fn test_archives() {
        let state = test_state().await;
        state
            .log_message_service
            .log_at("Spring entry", Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap())
            .await
            .unwrap();

        let yearly = get(app(&state), "/archive/2024/").await;
        assert_eq!(yearly.status(), StatusCode::OK);
        assert!(body_text(yearly).await.contains("Spring entry"));

        let monthly = get(app(&state), "/archive/2024/3/").await;
        assert_eq!(monthly.status(), StatusCode::OK);
        let html = body_text(monthly).await;
        assert!(html.contains("March 2024"));
        assert!(html.contains("Spring entry"));

        for uri in [
            "/archive/2023/",
            "/archive/2024/4/",
            "/archive/2024/13/",
            "/archive/24/",
            "/archive/2024/march/",
        ] {
            assert_eq!(
                get(app(&state), uri).await.status(),
                StatusCode::NOT_FOUND,
                "{}",
                uri
            );
        }
    }

    #[tokio::test]
    async fn test_empty_archive_message() {
        let state = test_state().await;
        let html = body_text(get(app(&state), "/archive/1999/").await).await;
        assert!(html.contains("No messages found for year 1999"));
    }

    #[tokio::test]
    async fn test_search() {
        let state = test_state().await;
        state.log_message_service.log("Learning Django views").await.unwrap();
        state.log_message_service.log("Something else").await.unwrap();

        let empty = body_text(get(app(&state), "/search/").await).await;
        assert!(!empty.contains("Search query cannot be empty."));

        let found = body_text(get(app(&state), "/search/?q=django").await).await;
        assert!(found.contains("Learning Django views"));
        assert!(!found.contains("Something else"));

        let short = body_text(get(app(&state), "/search/?q=d").await).await;
        assert!(short.contains("Search query must be at least 2 characters long."));
    }
}
