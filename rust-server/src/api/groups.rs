use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::{json_body, parse_id, AppState};
use crate::db::{Group, GroupMember};
use crate::error::ApiError;

// ============================================================================
// HTTP Handlers - Groups
// ============================================================================

const MAX_GROUP_NAME: usize = 100;

#[derive(Deserialize)]
pub struct CreateGroupRequest {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
pub struct JoinGroupRequest {
    group_id: String,
}

fn group_not_found() -> ApiError {
    ApiError::NotFound("Group not found".to_string())
}

/// Load a group the caller belongs to: 404 when missing, 403 when not a member
async fn member_group(state: &AppState, id: &str, user_id: &str) -> Result<Group, ApiError> {
    let id = parse_id(id, "Invalid group id")?;
    let group = state.db.get_group(&id).await?.ok_or_else(group_not_found)?;

    if !group.members.iter().any(|member| member.user_id == user_id) {
        return Err(ApiError::Forbidden("You are not a member of this group".to_string()));
    }
    Ok(group)
}

/// POST /api/groups - the caller becomes the group's DM
pub async fn create_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateGroupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = state.tokens.authenticate(&headers)?;
    let req = json_body(payload)?;

    let name = req.name.trim();
    if name.is_empty() || name.chars().count() > MAX_GROUP_NAME {
        return Err(ApiError::BadRequest(
            "Group name must be between 1 and 100 characters".to_string(),
        ));
    }

    let group = state
        .db
        .create_group(name, req.description.trim(), &auth.user_id)
        .await?;

    info!("{} created group {} (id: {})", auth.username, group.name, group.id);
    Ok((StatusCode::CREATED, Json(group)))
}

/// GET /api/groups - groups the caller belongs to
pub async fn list_groups(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Group>>, ApiError> {
    let auth = state.tokens.authenticate(&headers)?;
    Ok(Json(state.db.list_groups_for_user(&auth.user_id).await?))
}

/// GET /api/groups/:id
pub async fn get_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Group>, ApiError> {
    let auth = state.tokens.authenticate(&headers)?;
    member_group(&state, &id, &auth.user_id).await.map(Json)
}

/// POST /api/groups/join
pub async fn join_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<JoinGroupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = state.tokens.authenticate(&headers)?;
    let req = json_body(payload)?;
    let group_id = parse_id(&req.group_id, "Invalid group id")?;

    if state.db.get_group(&group_id).await?.is_none() {
        return Err(group_not_found());
    }
    state.db.join_group(&group_id, &auth.user_id).await?;

    info!("{} joined group {}", auth.username, group_id);
    Ok(Json(serde_json::json!({ "message": "Joined group successfully" })))
}

/// DELETE /api/groups/:id/leave
pub async fn leave_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = state.tokens.authenticate(&headers)?;
    let group_id = parse_id(&id, "Invalid group id")?;

    state.db.leave_group(&group_id, &auth.user_id).await?;

    info!("{} left group {}", auth.username, group_id);
    Ok(Json(serde_json::json!({ "message": "Left group successfully" })))
}

/// GET /api/groups/:id/members
pub async fn group_members(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<GroupMember>>, ApiError> {
    let auth = state.tokens.authenticate(&headers)?;
    member_group(&state, &id, &auth.user_id)
        .await
        .map(|group| Json(group.members))
}
