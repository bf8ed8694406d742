//! Mentorship group endpoints
//!
//! ## Endpoints
//!
//! - `GET /groups/{id}` - Group details
//! - `PATCH /groups/{id}` - Update group metadata
//! - `DELETE /groups/{id}` - Soft-delete a group (cascades pointer cleanup)
//! - `POST /groups/{id}/members` - Add students/mentors
//! - `DELETE /groups/{id}/members/{uid}` - Remove one member
//! - `GET /missions/{id}/groups` - List a mission's groups (via missions)
//! - `POST /missions/{id}/groups` - Create a group (via missions)

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::schemas::{GroupStatus, MentorshipGroupDoc};
use crate::groups::{AddMembers, CreateGroup, GroupPatch};
use crate::routes::{
    admin_error_response, error_response, json_response, read_json, FullBody,
};
use crate::server::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: Option<String>,
    pub max_students: Option<i64>,
    pub group_type: Option<String>,
    pub skill_level: Option<String>,
    pub meeting_schedule: Option<String>,
    pub channel: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AddMembersRequest {
    #[serde(default)]
    pub student_ids: Vec<String>,
    #[serde(default)]
    pub mentor_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PatchGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub group_type: Option<String>,
    pub skill_level: Option<String>,
    pub meeting_schedule: Option<String>,
    pub channel: Option<String>,
    pub primary_mentor_id: Option<String>,
    pub max_students: Option<i64>,
}

/// Group details
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResponse {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub mission_id: String,
    pub batch_id: String,
    pub student_ids: Vec<String>,
    pub mentor_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_mentor_id: Option<String>,
    pub max_students: i64,
    pub current_students: i64,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<MentorshipGroupDoc> for GroupResponse {
    fn from(group: MentorshipGroupDoc) -> Self {
        Self {
            id: group._id.map(|o| o.to_hex()).unwrap_or_default(),
            name: group.name,
            description: group.description,
            mission_id: group.mission_id,
            batch_id: group.batch_id,
            student_ids: group.student_ids,
            mentor_ids: group.mentor_ids,
            primary_mentor_id: group.primary_mentor_id,
            max_students: group.max_students,
            current_students: group.current_students,
            status: group.status.as_str(),
            group_type: group.group_type,
            skill_level: group.skill_level,
            meeting_schedule: group.meeting_schedule,
            channel: group.channel,
            created_at: group.metadata.created_at.map(|d| d.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

// =============================================================================
// Route Handler
// =============================================================================

/// Main handler for /groups/* routes
pub async fn handle_group_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();

    let subpath = path.strip_prefix("/groups/").unwrap_or("");
    let segments: Vec<&str> = subpath.split('/').filter(|s| !s.is_empty()).collect();

    match (method, segments.as_slice()) {
        (Method::GET, [id]) => handle_get(state, id).await,
        (Method::PATCH, [id]) => handle_patch(req, state, id).await,
        (Method::DELETE, [id]) => handle_delete(state, id).await,
        (Method::POST, [id, "members"]) => handle_add_members(req, state, id).await,
        (Method::DELETE, [id, "members", uid]) => handle_remove_member(state, id, uid).await,
        _ => error_response(StatusCode::NOT_FOUND, "Not found", None),
    }
}

// =============================================================================
// Endpoint Handlers
// =============================================================================

/// GET /missions/{id}/groups - List groups of a mission
pub async fn handle_list_by_mission(state: Arc<AppState>, mission_id: &str) -> Response<FullBody> {
    let manager = match state.require_groups() {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    match manager.list_by_mission(mission_id).await {
        Ok(groups) => {
            let body: Vec<GroupResponse> = groups.into_iter().map(Into::into).collect();
            json_response(StatusCode::OK, &body)
        }
        Err(e) => admin_error_response(e),
    }
}

/// POST /missions/{id}/groups - Create a group
pub async fn handle_create(
    req: Request<Incoming>,
    state: Arc<AppState>,
    mission_id: &str,
) -> Response<FullBody> {
    let manager = match state.require_groups() {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    let request: CreateGroupRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let params = CreateGroup {
        name: request.name,
        description: request.description,
        max_students: request.max_students,
        group_type: request.group_type,
        skill_level: request.skill_level,
        meeting_schedule: request.meeting_schedule,
        channel: request.channel,
    };

    match manager.create(mission_id, params).await {
        Ok(group) => json_response(StatusCode::CREATED, &GroupResponse::from(group)),
        Err(e) => admin_error_response(e),
    }
}

/// GET /groups/{id} - Group details
async fn handle_get(state: Arc<AppState>, group_id: &str) -> Response<FullBody> {
    let manager = match state.require_groups() {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    match manager.get(group_id).await {
        Ok(group) => json_response(StatusCode::OK, &GroupResponse::from(group)),
        Err(e) => admin_error_response(e),
    }
}

/// PATCH /groups/{id} - Update group metadata
async fn handle_patch(
    req: Request<Incoming>,
    state: Arc<AppState>,
    group_id: &str,
) -> Response<FullBody> {
    let manager = match state.require_groups() {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    let request: PatchGroupRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let status = match request.status.as_deref() {
        None => None,
        Some(s) => match GroupStatus::parse(s) {
            Some(parsed) => Some(parsed),
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "Invalid status. Must be active, inactive, full, or recruiting",
                    Some("VALIDATION_ERROR"),
                )
            }
        },
    };

    let patch = GroupPatch {
        name: request.name,
        description: request.description,
        status,
        group_type: request.group_type,
        skill_level: request.skill_level,
        meeting_schedule: request.meeting_schedule,
        channel: request.channel,
        primary_mentor_id: request.primary_mentor_id,
        max_students: request.max_students,
    };

    match manager.update(group_id, patch).await {
        Ok(group) => json_response(StatusCode::OK, &GroupResponse::from(group)),
        Err(e) => admin_error_response(e),
    }
}

/// DELETE /groups/{id} - Soft-delete a group
async fn handle_delete(state: Arc<AppState>, group_id: &str) -> Response<FullBody> {
    let manager = match state.require_groups() {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    match manager.delete(group_id).await {
        Ok(()) => json_response(
            StatusCode::OK,
            &SuccessResponse {
                success: true,
                message: "Group deleted".to_string(),
            },
        ),
        Err(e) => admin_error_response(e),
    }
}

/// POST /groups/{id}/members - Add students/mentors
async fn handle_add_members(
    req: Request<Incoming>,
    state: Arc<AppState>,
    group_id: &str,
) -> Response<FullBody> {
    let manager = match state.require_groups() {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    let request: AddMembersRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let members = AddMembers {
        student_ids: request.student_ids,
        mentor_ids: request.mentor_ids,
    };

    match manager.add_members(group_id, members).await {
        Ok(group) => json_response(StatusCode::OK, &GroupResponse::from(group)),
        Err(e) => admin_error_response(e),
    }
}

/// DELETE /groups/{id}/members/{uid} - Remove one member
async fn handle_remove_member(
    state: Arc<AppState>,
    group_id: &str,
    user_id: &str,
) -> Response<FullBody> {
    let manager = match state.require_groups() {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    match manager.remove_member(group_id, user_id).await {
        Ok(group) => json_response(StatusCode::OK, &GroupResponse::from(group)),
        Err(e) => admin_error_response(e),
    }
}
