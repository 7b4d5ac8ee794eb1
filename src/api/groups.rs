//! Group API endpoints
//!
//! - GET /api/groups/top - Largest groups first

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::GroupWithMemberCount;
use crate::services::group::TOP_GROUPS;

/// Create the groups router
pub fn router() -> Router<AppState> {
    Router::new().route("/top", get(top_groups))
}

#[derive(Debug, Serialize)]
pub struct TopGroupsResponse {
    pub groups: Vec<GroupWithMemberCount>,
}

/// GET /api/groups/top
async fn top_groups(State(state): State<AppState>) -> Result<Json<TopGroupsResponse>, ApiError> {
    let groups = state.group_service.top_by_member_count(TOP_GROUPS).await?;
    Ok(Json(TopGroupsResponse { groups }))
}
