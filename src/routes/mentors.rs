//! Mentor assignment endpoints
//!
//! ## Endpoints
//!
//! - `GET /missions/{id}/mentors` - List assignments with capacity usage
//! - `POST /missions/{id}/mentors` - Bulk-assign mentors (best-effort)
//! - `POST /missions/{id}/mentors/recount` - Recompute workload counters

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::schemas::{MentorRole, MissionMentorDoc};
use crate::routes::{
    admin_error_response, error_response, json_response, read_json, FullBody,
};
use crate::server::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignMentorsRequest {
    pub mentor_ids: Vec<String>,
    /// Role for every mentor in the batch; defaults to advisor
    pub role: Option<String>,
}

/// One mentor assignment with derived capacity usage
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorResponse {
    pub mentor_id: String,
    pub role: &'static str,
    pub status: &'static str,
    pub max_students: i64,
    pub current_students: i64,
    pub capacity_used_percent: f64,
    pub availability_rate: f64,
}

impl From<MissionMentorDoc> for MentorResponse {
    fn from(assignment: MissionMentorDoc) -> Self {
        Self {
            capacity_used_percent: assignment.capacity_used_percent(),
            mentor_id: assignment.mentor_id,
            role: assignment.role.as_str(),
            status: assignment.status.as_str(),
            max_students: assignment.max_students,
            current_students: assignment.current_students,
            availability_rate: assignment.availability_rate,
        }
    }
}

/// Best-effort batch assignment outcome
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResponse {
    pub assigned: Vec<String>,
    pub skipped: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorRecountResponse {
    pub recomputed: usize,
}

// =============================================================================
// Endpoint Handlers
// =============================================================================

/// GET /missions/{id}/mentors - List assignments
pub async fn handle_list(state: Arc<AppState>, mission_id: &str) -> Response<FullBody> {
    let tracker = match state.require_workload() {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    match tracker.list_mission(mission_id).await {
        Ok(assignments) => {
            let body: Vec<MentorResponse> = assignments.into_iter().map(Into::into).collect();
            json_response(StatusCode::OK, &body)
        }
        Err(e) => admin_error_response(e),
    }
}

/// POST /missions/{id}/mentors - Bulk-assign mentors
pub async fn handle_assign(
    req: Request<Incoming>,
    state: Arc<AppState>,
    mission_id: &str,
) -> Response<FullBody> {
    let tracker = match state.require_workload() {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    let request: AssignMentorsRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    if request.mentor_ids.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "No mentor ids provided",
            Some("VALIDATION_ERROR"),
        );
    }

    let role = match request.role.as_deref() {
        None => MentorRole::Advisor,
        Some(s) => match MentorRole::parse(s) {
            Some(r) => r,
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "Invalid role. Must be mission-lead, coordinator, advisor, or supervisor",
                    Some("VALIDATION_ERROR"),
                )
            }
        },
    };

    match tracker.assign(mission_id, &request.mentor_ids, role).await {
        Ok(outcome) => json_response(
            StatusCode::OK,
            &AssignResponse {
                assigned: outcome.assigned,
                skipped: outcome.skipped,
                errors: outcome.errors,
            },
        ),
        Err(e) => admin_error_response(e),
    }
}

/// POST /missions/{id}/mentors/recount - Recompute workload counters
pub async fn handle_recount(state: Arc<AppState>, mission_id: &str) -> Response<FullBody> {
    let tracker = match state.require_workload() {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    match tracker.recompute_mission(mission_id).await {
        Ok(recomputed) => json_response(StatusCode::OK, &MentorRecountResponse { recomputed }),
        Err(e) => admin_error_response(e),
    }
}
