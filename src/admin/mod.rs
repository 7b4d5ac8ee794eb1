//! Model admin
//!
//! A static registry describes how each model is listed: columns, search
//! fields, filters, ordering and read-only fields. The endpoints load a
//! model's rows as JSON and hand them to [`changelist`] together with the
//! request's query string.
//!
//! - GET /admin/ - Registered models and their configuration
//! - GET /admin/{model}/?q=&o=&p=&<filter>= - Changelist
//! - POST /admin/{model}/ - Add an object

mod changelist;

pub use changelist::{changelist, Changelist, ChangelistError, ChangelistParams};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Display;

use crate::api::{ApiError, ApiJson, ApiQuery, AppState};
use crate::converters::{PathConverter, SlugWithUnderscoreConverter};
use crate::models::{
    CreateCategoryInput, CreateGroupInput, CreatePersonInput, CreatePostInput, CreateQuestionInput,
};

/// Upper bound on rows loaded for models without a plain list query
pub const ADMIN_MAX_ROWS: i64 = 1000;

/// Models known to the admin, addressed by their lowercase name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminModel {
    Person,
    Category,
    Post,
    Question,
    Choice,
    Group,
    LogMessage,
}

impl AdminModel {
    pub fn name(&self) -> &'static str {
        match self {
            AdminModel::Person => "person",
            AdminModel::Category => "category",
            AdminModel::Post => "post",
            AdminModel::Question => "question",
            AdminModel::Choice => "choice",
            AdminModel::Group => "group",
            AdminModel::LogMessage => "logmessage",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        REGISTRY.iter().map(|a| a.model).find(|m| m.name() == name)
    }
}

/// How one model is shown and edited in the admin
#[derive(Debug, Clone, Serialize)]
pub struct ModelAdmin {
    pub model: AdminModel,
    pub verbose_name_plural: &'static str,
    pub list_display: &'static [&'static str],
    pub list_filter: &'static [&'static str],
    /// `__` follows a foreign key, e.g. `author__last_name`
    pub search_fields: &'static [&'static str],
    pub ordering: &'static [&'static str],
    pub readonly_fields: &'static [&'static str],
    /// Target field and the fields it is derived from
    pub prepopulated_fields: &'static [(&'static str, &'static [&'static str])],
    pub autocomplete_fields: &'static [&'static str],
    pub date_hierarchy: Option<&'static str>,
    pub list_per_page: u32,
}

impl ModelAdmin {
    /// Fields accepted as changelist filters
    pub fn filterable(&self, field: &str) -> bool {
        self.list_filter.contains(&field) || self.date_hierarchy == Some(field)
    }

    pub fn is_readonly(&self, field: &str) -> bool {
        field == "id" || self.readonly_fields.contains(&field)
    }
}

const LIST_PER_PAGE: u32 = 100;

pub static REGISTRY: &[ModelAdmin] = &[
    ModelAdmin {
        model: AdminModel::Person,
        verbose_name_plural: "people",
        list_display: &["first_name", "last_name", "email", "status", "created_at", "updated_at"],
        list_filter: &["status"],
        search_fields: &["first_name", "last_name", "email"],
        ordering: &["last_name", "first_name", "status"],
        readonly_fields: &["created_at", "updated_at"],
        prepopulated_fields: &[],
        autocomplete_fields: &[],
        date_hierarchy: None,
        list_per_page: LIST_PER_PAGE,
    },
    ModelAdmin {
        model: AdminModel::Category,
        verbose_name_plural: "categories",
        list_display: &["name", "description", "created_at"],
        list_filter: &[],
        search_fields: &["name"],
        ordering: &["name"],
        readonly_fields: &["created_at"],
        prepopulated_fields: &[],
        autocomplete_fields: &[],
        date_hierarchy: None,
        list_per_page: LIST_PER_PAGE,
    },
    ModelAdmin {
        model: AdminModel::Post,
        verbose_name_plural: "posts",
        list_display: &["title", "author", "category", "created_at", "updated_at"],
        list_filter: &["category", "created_at"],
        search_fields: &["title", "author__first_name", "author__last_name"],
        ordering: &["-created_at"],
        readonly_fields: &["created_at", "updated_at"],
        prepopulated_fields: &[("slug", &["title"])],
        autocomplete_fields: &["author", "category"],
        date_hierarchy: Some("created_at"),
        list_per_page: LIST_PER_PAGE,
    },
    ModelAdmin {
        model: AdminModel::Question,
        verbose_name_plural: "questions",
        list_display: &["question_text", "pub_date"],
        list_filter: &[],
        search_fields: &["question_text"],
        ordering: &[],
        readonly_fields: &[],
        prepopulated_fields: &[],
        autocomplete_fields: &[],
        date_hierarchy: Some("pub_date"),
        list_per_page: LIST_PER_PAGE,
    },
    ModelAdmin {
        model: AdminModel::Choice,
        verbose_name_plural: "choices",
        list_display: &["choice_text", "question", "votes"],
        list_filter: &[],
        search_fields: &["choice_text", "question__question_text"],
        ordering: &[],
        readonly_fields: &["votes"],
        prepopulated_fields: &[],
        autocomplete_fields: &["question"],
        date_hierarchy: None,
        list_per_page: LIST_PER_PAGE,
    },
    ModelAdmin {
        model: AdminModel::Group,
        verbose_name_plural: "groups",
        list_display: &["name", "slug"],
        list_filter: &[],
        search_fields: &["name"],
        ordering: &["name"],
        readonly_fields: &[],
        prepopulated_fields: &[("slug", &["name"])],
        autocomplete_fields: &[],
        date_hierarchy: None,
        list_per_page: LIST_PER_PAGE,
    },
    ModelAdmin {
        model: AdminModel::LogMessage,
        verbose_name_plural: "log messages",
        list_display: &["message", "log_date"],
        list_filter: &[],
        search_fields: &["message"],
        ordering: &["-log_date"],
        readonly_fields: &["log_date"],
        prepopulated_fields: &[],
        autocomplete_fields: &[],
        date_hierarchy: Some("log_date"),
        list_per_page: LIST_PER_PAGE,
    },
];

/// Registry entry for `model`
pub fn model_admin(model: AdminModel) -> &'static ModelAdmin {
    REGISTRY
        .iter()
        .find(|a| a.model == model)
        .unwrap_or(&REGISTRY[0])
}

/// Create the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/", get(index))
        .route("/admin/{model}/", get(changelist_view).post(add_object))
}

#[derive(Debug, Serialize)]
pub struct AdminIndexEntry {
    #[serde(flatten)]
    pub admin: &'static ModelAdmin,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct AdminIndexResponse {
    pub models: Vec<AdminIndexEntry>,
}

#[derive(Debug, Serialize)]
pub struct AddObjectResponse {
    pub model: &'static str,
    pub object: Value,
}

#[derive(Debug, Deserialize)]
struct AddChoiceInput {
    question_id: i64,
    choice_text: String,
}

#[derive(Debug, Deserialize)]
struct AddLogMessageInput {
    message: String,
}

/// GET /admin/
async fn index() -> Json<AdminIndexResponse> {
    Json(AdminIndexResponse {
        models: REGISTRY
            .iter()
            .map(|admin| AdminIndexEntry {
                admin,
                url: format!("/admin/{}/", admin.model.name()),
            })
            .collect(),
    })
}

/// GET /admin/{model}/
async fn changelist_view(
    State(state): State<AppState>,
    Path(model): Path<String>,
    ApiQuery(query): ApiQuery<HashMap<String, String>>,
) -> Result<Json<Changelist>, ApiError> {
    let admin = resolve(&model)?;
    let (rows, truncated) = cap_rows(load_rows(&state, admin.model).await?, ADMIN_MAX_ROWS);
    if truncated {
        tracing::warn!(
            model = admin.model.name(),
            max_rows = ADMIN_MAX_ROWS,
            "Admin changelist truncated"
        );
    }
    let mut list = changelist(admin, rows, &ChangelistParams::from_query(&query))
        .map_err(|e| ApiError::validation_error(e.to_string()))?;
    list.truncated = truncated;
    Ok(Json(list))
}

/// POST /admin/{model}/
async fn add_object(
    State(state): State<AppState>,
    Path(model): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> Result<(StatusCode, Json<AddObjectResponse>), ApiError> {
    let admin = resolve(&model)?;
    let fields = body
        .as_object()
        .ok_or_else(|| ApiError::validation_error("Expected a JSON object"))?;
    if let Some(field) = fields.keys().find(|f| admin.is_readonly(f)) {
        return Err(ApiError::validation_error(format!(
            "Field '{}' is read-only",
            field
        )));
    }

    let object = match admin.model {
        AdminModel::Person => {
            let input: CreatePersonInput = parse_input(admin, body)?;
            record(&state.person_service.create(input).await?)?
        }
        AdminModel::Category => {
            let input: CreateCategoryInput = parse_input(admin, body)?;
            record(&state.category_service.create(input).await?)?
        }
        AdminModel::Post => {
            let input: CreatePostInput = parse_input(admin, body)?;
            record(&state.post_service.create(input).await?)?
        }
        AdminModel::Question => {
            let input: CreateQuestionInput = parse_input(admin, body)?;
            record(&state.poll_service.create_question(input).await?.question)?
        }
        AdminModel::Choice => {
            let input: AddChoiceInput = parse_input(admin, body)?;
            let choice = state
                .poll_service
                .add_choice(input.question_id, &input.choice_text)
                .await?;
            record(&choice)?
        }
        AdminModel::Group => {
            let input: CreateGroupInput = parse_input(admin, body)?;
            record(&state.group_service.create(input).await?)?
        }
        AdminModel::LogMessage => {
            let input: AddLogMessageInput = parse_input(admin, body)?;
            record(&state.log_message_service.log(&input.message).await?)?
        }
    };

    tracing::info!("Admin added {} {}", admin.model.name(), object["id"]);
    Ok((
        StatusCode::CREATED,
        Json(AddObjectResponse {
            model: admin.model.name(),
            object,
        }),
    ))
}

fn resolve(segment: &str) -> Result<&'static ModelAdmin, ApiError> {
    SlugWithUnderscoreConverter::to_value(segment)
        .and_then(|name| AdminModel::from_name(&name.to_lowercase()))
        .map(model_admin)
        .ok_or_else(|| ApiError::not_found(format!("Unknown admin model: {}", segment)))
}

fn parse_input<T: DeserializeOwned>(admin: &ModelAdmin, body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| {
        ApiError::validation_error(format!("Invalid {} data: {}", admin.model.name(), e))
    })
}

/// JSON form of an object plus its `display` string
fn record<T: Serialize + Display>(item: &T) -> Result<Value, ApiError> {
    let mut value = serde_json::to_value(item)
        .map_err(|e| ApiError::internal_error(format!("Failed to serialize row: {}", e)))?;
    if let Value::Object(map) = &mut value {
        map.insert("display".to_string(), Value::String(item.to_string()));
    }
    Ok(value)
}

fn records<T: Serialize + Display>(items: &[T]) -> Result<Vec<Value>, ApiError> {
    items.iter().map(record).collect()
}

/// Index rows by id for foreign key embedding
fn by_id(rows: &[Value]) -> HashMap<i64, Value> {
    rows.iter()
        .filter_map(|row| row.get("id").and_then(Value::as_i64).map(|id| (id, row.clone())))
        .collect()
}

/// Replace `{key}_id` with the related object stored under `key`
fn embed(row: &mut Value, key: &str, related: &HashMap<i64, Value>) {
    if let Value::Object(map) = row {
        let target = map
            .get(&format!("{}_id", key))
            .and_then(Value::as_i64)
            .and_then(|id| related.get(&id))
            .cloned()
            .unwrap_or(Value::Null);
        map.insert(key.to_string(), target);
    }
}

/// Keep the first `max` rows and report whether any were dropped
fn cap_rows(mut rows: Vec<Value>, max: i64) -> (Vec<Value>, bool) {
    let max = usize::try_from(max).unwrap_or(0);
    let truncated = rows.len() > max;
    rows.truncate(max);
    (rows, truncated)
}

/// Rows for `model`. Posts and log messages load one row past
/// `ADMIN_MAX_ROWS` so the caller can tell when the cap was hit.
async fn load_rows(state: &AppState, model: AdminModel) -> Result<Vec<Value>, ApiError> {
    let rows = match model {
        AdminModel::Person => records(&state.person_service.list().await?)?,
        AdminModel::Category => records(&state.category_service.list().await?)?,
        AdminModel::Post => {
            let people = by_id(&records(&state.person_service.list().await?)?);
            let categories = by_id(&records(&state.category_service.list().await?)?);
            let mut rows = records(&state.post_service.recent(ADMIN_MAX_ROWS + 1).await?)?;
            for row in &mut rows {
                embed(row, "author", &people);
                embed(row, "category", &categories);
            }
            rows
        }
        AdminModel::Question => records(&state.poll_service.list_questions().await?)?,
        AdminModel::Choice => {
            let questions = by_id(&records(&state.poll_service.list_questions().await?)?);
            let mut rows = records(&state.poll_service.list_choices().await?)?;
            for row in &mut rows {
                embed(row, "question", &questions);
            }
            rows
        }
        AdminModel::Group => records(&state.group_service.list().await?)?,
        AdminModel::LogMessage => {
            records(&state.log_message_service.recent(ADMIN_MAX_ROWS + 1).await?)?
        }
    };
    Ok(rows)
}
