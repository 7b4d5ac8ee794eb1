//! Shared API plumbing
//!
//! Contains:
//! - `AppState`, the services and engines every handler shares
//! - `ApiError`, the JSON error body and its status mapping
//! - `ApiJson` / `ApiQuery`, extractors that reject with an `ApiError`
//! - Cache-Control helpers

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::MemoryCache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxCategoryRepository, SqlxGroupRepository, SqlxLogMessageRepository, SqlxPersonRepository,
    SqlxPollRepository, SqlxPostRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{
    CategoryService, CategoryServiceError, GroupService, GroupServiceError, LogMessageService,
    LogMessageServiceError, PersonService, PersonServiceError, PollService, PollServiceError,
    PostService, PostServiceError,
};
use crate::templates::TemplateEngine;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Arc<MemoryCache>,
    pub templates: Arc<TemplateEngine>,
    pub person_service: Arc<PersonService>,
    pub post_service: Arc<PostService>,
    pub category_service: Arc<CategoryService>,
    pub group_service: Arc<GroupService>,
    pub poll_service: Arc<PollService>,
    pub log_message_service: Arc<LogMessageService>,
}

impl AppState {
    /// Wire repositories and services over one pool
    pub fn new(
        config: Config,
        pool: DynDatabasePool,
        cache: Arc<MemoryCache>,
        templates: TemplateEngine,
    ) -> Self {
        let person_repo = SqlxPersonRepository::boxed(pool.clone());
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());

        let post_service = PostService::new(
            SqlxPostRepository::boxed(pool.clone()),
            person_repo.clone(),
            category_repo.clone(),
        );
        let group_service = GroupService::new(SqlxGroupRepository::boxed(pool.clone()), person_repo.clone());

        Self {
            config: Arc::new(config),
            templates: Arc::new(templates),
            person_service: Arc::new(PersonService::new(person_repo)),
            post_service: Arc::new(post_service),
            category_service: Arc::new(CategoryService::new(category_repo, cache.clone())),
            group_service: Arc::new(group_service),
            poll_service: Arc::new(PollService::new(SqlxPollRepository::boxed(pool.clone()))),
            log_message_service: Arc::new(LogMessageService::new(SqlxLogMessageRepository::boxed(pool))),
            cache,
        }
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Logs the cause; clients only see a generic message
    pub fn internal_error(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!("Internal error: {}", message);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<PersonServiceError> for ApiError {
    fn from(err: PersonServiceError) -> Self {
        match err {
            PersonServiceError::DuplicateEmail(_) => Self::conflict(err.to_string()),
            PersonServiceError::NotFound(_) => Self::not_found(err.to_string()),
            PersonServiceError::ValidationError(msg) => Self::validation_error(msg),
            PersonServiceError::InvalidPattern(msg) => Self::with_details(
                "VALIDATION_ERROR",
                "Invalid regex pattern",
                serde_json::json!({ "pattern": msg }),
            ),
            PersonServiceError::InternalError(e) => Self::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<PostServiceError> for ApiError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::NotFound(_) => Self::not_found(err.to_string()),
            PostServiceError::AuthorNotFound(_) | PostServiceError::CategoryNotFound(_) => {
                Self::validation_error(err.to_string())
            }
            PostServiceError::DuplicateTitle(_) | PostServiceError::DuplicateSlug(_) => {
                Self::conflict(err.to_string())
            }
            PostServiceError::ValidationError(msg) => Self::validation_error(msg),
            PostServiceError::InternalError(e) => Self::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(err: CategoryServiceError) -> Self {
        match err {
            CategoryServiceError::DuplicateName(_) => Self::conflict(err.to_string()),
            CategoryServiceError::NotFound(_) => Self::not_found(err.to_string()),
            CategoryServiceError::ValidationError(msg) => Self::validation_error(msg),
            CategoryServiceError::InternalError(e) => Self::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<GroupServiceError> for ApiError {
    fn from(err: GroupServiceError) -> Self {
        match err {
            GroupServiceError::DuplicateName(_) | GroupServiceError::DuplicateSlug(_) => {
                Self::conflict(err.to_string())
            }
            GroupServiceError::NotFound(_) => Self::not_found(err.to_string()),
            GroupServiceError::PersonNotFound(_) | GroupServiceError::ValidationError(_) => {
                Self::validation_error(err.to_string())
            }
            GroupServiceError::InternalError(e) => Self::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<PollServiceError> for ApiError {
    fn from(err: PollServiceError) -> Self {
        match err {
            PollServiceError::QuestionNotFound(_) => Self::not_found(err.to_string()),
            PollServiceError::ChoiceNotFound { .. } => Self::validation_error(err.to_string()),
            PollServiceError::ValidationError(msg) => Self::validation_error(msg),
            PollServiceError::InternalError(e) => Self::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<LogMessageServiceError> for ApiError {
    fn from(err: LogMessageServiceError) -> Self {
        match err {
            LogMessageServiceError::NotFound(_) => Self::not_found(err.to_string()),
            LogMessageServiceError::ValidationError(msg) => Self::validation_error(msg),
            LogMessageServiceError::InternalError(e) => Self::internal_error(format!("{:#}", e)),
        }
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// `Json` body extractor; a bad body is a `VALIDATION_ERROR`
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` extractor; a query string that doesn't parse is a `VALIDATION_ERROR`
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation_error(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation_error(rejection.body_text())
    }
}

// ============================================================================
// HTTP Cache Headers
// ============================================================================

/// Cache-Control for pages any cache may keep for `max_age` seconds
pub fn cache_control_public(max_age: u32) -> String {
    format!("public, max-age={}", max_age)
}

// ============================================================================
// Tests
// ============================================================================
