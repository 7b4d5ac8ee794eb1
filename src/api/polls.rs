//! Poll API endpoints
//!
//! - GET /api/polls/ - Latest published questions
//! - GET /api/polls/{id}/ - A question with its choices
//! - GET /api/polls/{id}/results/ - Vote counts
//! - POST /api/polls/{id}/vote/ - Vote for a choice

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, ApiJson, AppState};
use crate::converters::{IntConverter, PathConverter};
use crate::models::{Choice, Question, QuestionWithChoices};
use crate::services::poll::LATEST_QUESTIONS;

/// Create the polls router. Paths are complete so the list keeps its
/// trailing slash when merged under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/polls/", get(list_questions))
        .route("/polls/{id}/", get(question_detail))
        .route("/polls/{id}/results/", get(question_results))
        .route("/polls/{id}/vote/", post(vote))
}

#[derive(Debug, Serialize)]
pub struct QuestionListResponse {
    pub questions: Vec<QuestionResponse>,
}

#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub id: i64,
    pub question_text: String,
    pub pub_date: String,
    pub was_published_recently: bool,
}

impl From<&Question> for QuestionResponse {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id,
            question_text: question.question_text.clone(),
            pub_date: question.pub_date.to_rfc3339(),
            was_published_recently: question.was_published_recently(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuestionDetailResponse {
    #[serde(flatten)]
    pub question: QuestionResponse,
    pub choices: Vec<Choice>,
    pub total_votes: i64,
}

impl From<QuestionWithChoices> for QuestionDetailResponse {
    fn from(poll: QuestionWithChoices) -> Self {
        Self {
            question: QuestionResponse::from(&poll.question),
            total_votes: poll.total_votes(),
            choices: poll.choices,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub choice: Option<i64>,
}

fn question_id(raw: &str) -> Result<i64, ApiError> {
    IntConverter::to_value(raw)
        .map(i64::from)
        .ok_or_else(|| ApiError::not_found(format!("No such question: {}", raw)))
}

/// Published question with choices; future questions are hidden
async fn published(state: &AppState, raw_id: &str) -> Result<QuestionWithChoices, ApiError> {
    let id = question_id(raw_id)?;
    let poll = state.poll_service.get(id).await?;
    if poll.question.pub_date > Utc::now() {
        return Err(ApiError::not_found(format!("Question not found: {}", id)));
    }
    Ok(poll)
}

/// GET /api/polls/
async fn list_questions(
    State(state): State<AppState>,
) -> Result<Json<QuestionListResponse>, ApiError> {
    let questions = state.poll_service.latest(LATEST_QUESTIONS).await?;
    Ok(Json(QuestionListResponse {
        questions: questions.iter().map(QuestionResponse::from).collect(),
    }))
}

/// GET /api/polls/{id}/
async fn question_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QuestionDetailResponse>, ApiError> {
    Ok(Json(published(&state, &id).await?.into()))
}

/// GET /api/polls/{id}/results/
async fn question_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QuestionDetailResponse>, ApiError> {
    Ok(Json(published(&state, &id).await?.into()))
}

/// POST /api/polls/{id}/vote/
async fn vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<VoteRequest>,
) -> Result<Json<QuestionDetailResponse>, ApiError> {
    let poll = published(&state, &id).await?;
    let choice = body
        .choice
        .ok_or_else(|| ApiError::validation_error("You didn't select a choice."))?;

    let results = state.poll_service.vote(poll.question.id, choice).await?;
    Ok(Json(results.into()))
}
