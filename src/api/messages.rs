//! Log message API endpoints
//!
//! - GET /api/messages/{yyyy}/ - Messages logged during a year

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState};
use crate::converters::{PathConverter, YearConverter};
use crate::models::LogMessage;

/// Create the messages router
pub fn router() -> Router<AppState> {
    Router::new().route("/{year}/", get(yearly_messages))
}

#[derive(Debug, Serialize)]
pub struct YearlyMessagesResponse {
    pub year: i32,
    pub count: usize,
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub message: String,
    pub log_date: String,
}

impl From<LogMessage> for MessageResponse {
    fn from(message: LogMessage) -> Self {
        Self {
            id: message.id,
            message: message.message,
            log_date: message.log_date.to_rfc3339(),
        }
    }
}

/// GET /api/messages/{yyyy}/
///
/// A year with no messages is an empty list, not a 404.
async fn yearly_messages(
    State(state): State<AppState>,
    Path(year): Path<String>,
) -> Result<Json<YearlyMessagesResponse>, ApiError> {
    let year = YearConverter::to_value(&year)
        .ok_or_else(|| ApiError::not_found(format!("No such year: {}", year)))?;

    let messages = state.log_message_service.for_year(year).await?;
    Ok(Json(YearlyMessagesResponse {
        year,
        count: messages.len(),
        messages: messages.into_iter().map(MessageResponse::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{app, body_json, get, test_state};
    use axum::http::StatusCode;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_yearly_messages() {
        let state = test_state().await;
        let service = &state.log_message_service;
        service
            .log_at("Hello 2023", Utc.with_ymd_and_hms(2023, 6, 1, 8, 0, 0).unwrap())
            .await
            .unwrap();
        service
            .log_at("Later 2023", Utc.with_ymd_and_hms(2023, 9, 1, 8, 0, 0).unwrap())
            .await
            .unwrap();
        service
            .log_at("Hello 2024", Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap())
            .await
            .unwrap();

        let response = get(app(&state), "/api/messages/2023/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["year"], 2023);
        assert_eq!(json["count"], 2);
        assert_eq!(json["messages"][0]["message"], "Later 2023");
        assert!(json["messages"][0]["log_date"]
            .as_str()
            .unwrap()
            .starts_with("2023-09-01T08:00:00"));
    }

    #[tokio::test]
    async fn test_empty_year_is_not_an_error() {
        let state = test_state().await;
        let response = get(app(&state), "/api/messages/1999/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["count"], 0);
    }

    #[tokio::test]
    async fn test_year_segment_must_have_four_digits() {
        let state = test_state().await;
        assert_eq!(
            get(app(&state), "/api/messages/99/").await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get(app(&state), "/api/messages/abcd/").await.status(),
            StatusCode::NOT_FOUND
        );
    }
}
