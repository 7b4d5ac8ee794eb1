//! People API endpoints
//!
//! - GET /api/people/search?q= - Name search, by last name
//! - GET /api/people/active - Active people
//! - GET /api/people/no-group - People in no group
//! - GET /api/people/by-year?year= - People created in a year
//! - GET /api/people/last-regex?pattern= - Regex match on last name
//! - GET /api/people/post-counts - Rows of the post count view

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, ApiQuery, AppState};
use crate::models::{PersonSummary, PostCount};
use crate::services::person::PEOPLE_LIMIT;

/// Create the people router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/search", get(search_people))
        .route("/active", get(active_people))
        .route("/no-group", get(people_without_group))
        .route("/by-year", get(people_by_year))
        .route("/last-regex", get(people_by_last_name))
        .route("/post-counts", get(post_counts))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PatternQuery {
    pub pattern: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PeopleResponse {
    pub results: Vec<PersonSummary>,
}

#[derive(Debug, Serialize)]
pub struct ActivePeopleResponse {
    pub active: Vec<PersonSummary>,
}

#[derive(Debug, Serialize)]
pub struct PeopleByYearResponse {
    pub year: i32,
    pub count: i64,
    pub results: Vec<PersonSummary>,
    pub from: String,
}

#[derive(Debug, Serialize)]
pub struct PatternResponse {
    pub pattern: String,
    pub results: Vec<PersonSummary>,
}

#[derive(Debug, Serialize)]
pub struct PostCountsResponse {
    pub results: Vec<PostCount>,
}

/// GET /api/people/search
async fn search_people(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<PeopleResponse>, ApiError> {
    let people = state
        .person_service
        .search(query.q.trim(), PEOPLE_LIMIT)
        .await?;

    Ok(Json(PeopleResponse {
        results: people.iter().map(PersonSummary::from).collect(),
    }))
}

/// GET /api/people/active
async fn active_people(
    State(state): State<AppState>,
) -> Result<Json<ActivePeopleResponse>, ApiError> {
    let people = state.person_service.active(PEOPLE_LIMIT).await?;

    Ok(Json(ActivePeopleResponse {
        active: people.iter().map(PersonSummary::from).collect(),
    }))
}

/// GET /api/people/no-group
async fn people_without_group(
    State(state): State<AppState>,
) -> Result<Json<PeopleResponse>, ApiError> {
    let people = state.person_service.without_groups(PEOPLE_LIMIT).await?;

    Ok(Json(PeopleResponse {
        results: people.iter().map(PersonSummary::from).collect(),
    }))
}

/// GET /api/people/by-year
async fn people_by_year(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<YearQuery>,
) -> Result<Json<PeopleByYearResponse>, ApiError> {
    let raw = query
        .year
        .filter(|y| !y.trim().is_empty())
        .ok_or_else(|| ApiError::validation_error("Missing year param"))?;
    let year: i32 = raw
        .trim()
        .parse()
        .map_err(|_| ApiError::validation_error("Year must be integer"))?;

    let by_year = state
        .person_service
        .created_in_year(year, PEOPLE_LIMIT)
        .await?;

    Ok(Json(PeopleByYearResponse {
        year: by_year.year,
        count: by_year.count,
        results: by_year.people.iter().map(PersonSummary::from).collect(),
        from: by_year.from.to_rfc3339(),
    }))
}

/// GET /api/people/last-regex
async fn people_by_last_name(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PatternQuery>,
) -> Result<Json<PatternResponse>, ApiError> {
    let pattern = query
        .pattern
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::validation_error("Missing pattern param"))?;

    let people = state
        .person_service
        .last_name_matches(&pattern, PEOPLE_LIMIT as usize)
        .await?;

    Ok(Json(PatternResponse {
        pattern,
        results: people.iter().map(PersonSummary::from).collect(),
    }))
}

/// GET /api/people/post-counts
async fn post_counts(State(state): State<AppState>) -> Result<Json<PostCountsResponse>, ApiError> {
    let results = state.person_service.post_counts().await?;
    Ok(Json(PostCountsResponse { results }))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{app, body_json, get, test_state};
    use crate::models::{CreatePersonInput, CreatePostInput, PersonStatus};
    use axum::http::StatusCode;
    use chrono::{Datelike, Utc};

    async fn seeded() -> crate::api::AppState {
        let state = test_state().await;
        let people = &state.person_service;
        let ada = people
            .create(CreatePersonInput::new("Ada", "Lovelace", "ada@example.com"))
            .await
            .unwrap();
        people
            .create(
                CreatePersonInput::new("Nguyễn", "Tiến", "tien@example.com")
                    .with_status(PersonStatus::Inactive),
            )
            .await
            .unwrap();
        people
            .create(CreatePersonInput::new("Alan", "Turing", "alan@example.com"))
            .await
            .unwrap();
        state
            .post_service
            .create(CreatePostInput::new("Notes", "On the engine", ada.id))
            .await
            .unwrap();
        state
    }

    #[tokio::test]
    async fn test_search_orders_by_last_name() {
        let state = seeded().await;
        let response = get(app(&state), "/api/people/search?q=A").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        let last_names: Vec<&str> = json["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["last_name"].as_str().unwrap())
            .collect();
        assert_eq!(last_names, vec!["Lovelace", "Turing"]);
        assert_eq!(json["results"][0]["slug"], "ada-lovelace");
        assert_eq!(json["results"][0]["status"], "AC");
    }

    #[tokio::test]
    async fn test_active_people() {
        let state = seeded().await;
        let json = body_json(get(app(&state), "/api/people/active").await).await;
        let active = json["active"].as_array().unwrap();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|p| p["status"] == "AC"));
    }

    #[tokio::test]
    async fn test_no_group() {
        let state = seeded().await;
        let json = body_json(get(app(&state), "/api/people/no-group").await).await;
        assert_eq!(json["results"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_by_year() {
        let state = seeded().await;
        let year = Utc::now().year();

        let response = get(app(&state), &format!("/api/people/by-year?year={}", year)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["year"], year);
        assert_eq!(json["count"], 3);
        assert!(json["from"].as_str().unwrap().starts_with(&format!("{}-01-01T00:00:00", year)));

        let json = body_json(get(app(&state), "/api/people/by-year?year=1999").await).await;
        assert_eq!(json["count"], 0);
    }

    #[tokio::test]
    async fn test_by_year_rejects_bad_input() {
        let state = seeded().await;
        let missing = get(app(&state), "/api/people/by-year").await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(missing).await["error"]["message"], "Missing year param");

        let word = get(app(&state), "/api/people/by-year?year=soon").await;
        assert_eq!(word.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(word).await["error"]["message"], "Year must be integer");
    }

    #[tokio::test]
    async fn test_last_name_regex() {
        let state = seeded().await;
        let response = get(
            app(&state),
            "/api/people/last-regex?pattern=%5ETi(en%7C%E1%BA%BFn)%24",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["pattern"], "^Ti(en|ến)$");
        assert_eq!(json["results"].as_array().unwrap().len(), 1);

        let missing = get(app(&state), "/api/people/last-regex").await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let invalid = get(app(&state), "/api/people/last-regex?pattern=(unclosed").await;
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(invalid).await["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_post_counts_view() {
        let state = seeded().await;
        let json = body_json(get(app(&state), "/api/people/post-counts").await).await;
        let rows = json["results"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["total_posts"], 1);
    }
}
