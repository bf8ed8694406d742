//! Mission enrollment and reconciliation endpoints
//!
//! ## Endpoints
//!
//! - `GET /missions` - List missions
//! - `POST /missions` - Create a mission
//! - `GET /missions/{id}` - Mission details
//! - `PUT /missions/{id}/status` - Update mission status (free assignment)
//! - `GET /missions/{id}/students` - Active roster
//! - `POST /missions/{id}/students` - Enroll a batch of students
//! - `DELETE /missions/{id}/students` - Soft-remove a batch of students
//! - `PUT /missions/{id}/students/{sid}/status` - Update status/progress
//! - `POST /missions/{id}/reconcile/fix` - Drop enrollments without batch membership
//! - `POST /missions/{id}/reconcile/sync` - Migrate legacy embedded array
//! - `POST /missions/{id}/reconcile/clear` - Drop every enrollment
//! - `POST /missions/{id}/reconcile/recount` - Refresh derived counters
//!
//! Group and mentor subroutes under /missions/{id} are delegated to the
//! `groups` and `mentors` modules.

use bson::{doc, oid::ObjectId, DateTime};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use mongodb::options::FindOptions;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::schemas::{
    validate_course_weights, EnrollmentStatus, MissionCourse, MissionDoc, MissionStatus,
    StudentMissionDoc, MISSION_COLLECTION,
};
use crate::db::MongoCollection;
use crate::enrollment::{EnrollOutcome, RemoveOutcome, RosterEntry};
use crate::routes::{
    admin_error_response, error_response, json_response, read_json, FullBody,
};
use crate::routes::{groups, mentors};
use crate::server::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    pub student_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: String,
    pub progress: Option<i32>,
}

/// One roster row
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntryResponse {
    pub student_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: &'static str,
    pub progress: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentorship_group_id: Option<String>,
}

impl From<RosterEntry> for RosterEntryResponse {
    fn from(entry: RosterEntry) -> Self {
        Self {
            student_id: entry.student_id,
            name: entry.name,
            status: entry.status.as_str(),
            progress: entry.progress,
            mentor_id: entry.mentor_id,
            mentorship_group_id: entry.mentorship_group_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollResponse {
    pub added_count: usize,
    pub already_enrolled: Vec<String>,
    pub roster: Vec<RosterEntryResponse>,
}

impl From<EnrollOutcome> for EnrollResponse {
    fn from(outcome: EnrollOutcome) -> Self {
        Self {
            added_count: outcome.added_count,
            already_enrolled: outcome.already_enrolled,
            roster: outcome.roster.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveResponse {
    pub removed_count: usize,
    pub not_enrolled: Vec<String>,
    pub roster: Vec<RosterEntryResponse>,
}

impl From<RemoveOutcome> for RemoveResponse {
    fn from(outcome: RemoveOutcome) -> Self {
        Self {
            removed_count: outcome.removed_count,
            not_enrolled: outcome.not_enrolled,
            roster: outcome.roster.into_iter().map(Into::into).collect(),
        }
    }
}

/// Full enrollment record
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    pub id: String,
    pub student_id: String,
    pub mission_id: String,
    pub batch_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentorship_group_id: Option<String>,
    pub status: &'static str,
    pub progress: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropped_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_at: Option<String>,
}

impl From<StudentMissionDoc> for RecordResponse {
    fn from(record: StudentMissionDoc) -> Self {
        Self {
            id: record._id.map(|o| o.to_hex()).unwrap_or_default(),
            student_id: record.student_id,
            mission_id: record.mission_id,
            batch_id: record.batch_id,
            mentor_id: record.mentor_id,
            mentorship_group_id: record.mentorship_group_id,
            status: record.status.as_str(),
            progress: record.progress,
            started_at: record.started_at.map(|d| d.to_string()),
            completed_at: record.completed_at.map(|d| d.to_string()),
            dropped_at: record.dropped_at.map(|d| d.to_string()),
            last_activity_at: record.last_activity_at.map(|d| d.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixResponse {
    pub changed_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub synced_count: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub updated_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecountResponse {
    pub mentors: usize,
    pub groups: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRequest {
    pub course_id: String,
    pub weight: u32,
    #[serde(default)]
    pub min_progress: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMissionRequest {
    pub code: String,
    pub title: String,
    pub batch_id: String,
    #[serde(default)]
    pub courses: Vec<CourseRequest>,
    pub max_students: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMissionStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseResponse {
    pub course_id: String,
    pub weight: u32,
    pub min_progress: u32,
}

/// Mission summary/details
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionResponse {
    pub id: String,
    pub code: String,
    pub title: String,
    pub status: &'static str,
    pub batch_id: String,
    pub courses: Vec<CourseResponse>,
    pub max_students: i64,
    /// Entries remaining in the legacy embedded array (candidates for sync)
    pub legacy_student_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<MissionDoc> for MissionResponse {
    fn from(mission: MissionDoc) -> Self {
        Self {
            id: mission.id_hex(),
            code: mission.code,
            title: mission.title,
            status: mission.status.as_str(),
            batch_id: mission.batch_id,
            courses: mission
                .courses
                .into_iter()
                .map(|c| CourseResponse {
                    course_id: c.course_id,
                    weight: c.weight,
                    min_progress: c.min_progress,
                })
                .collect(),
            max_students: mission.max_students,
            legacy_student_count: mission.students.len(),
            created_at: mission.metadata.created_at.map(|d| d.to_string()),
        }
    }
}

// =============================================================================
// Route Handler
// =============================================================================

/// Main handler for /missions/* routes
pub async fn handle_mission_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();

    let subpath = path.strip_prefix("/missions/").unwrap_or("");
    let segments: Vec<&str> = subpath.split('/').filter(|s| !s.is_empty()).collect();

    match (method, segments.as_slice()) {
        (Method::GET, [id]) => handle_get_mission(state, id).await,
        (Method::PUT, [id, "status"]) => handle_update_mission_status(req, state, id).await,

        (Method::GET, [id, "students"]) => handle_roster(state, id).await,
        (Method::POST, [id, "students"]) => handle_enroll(req, state, id).await,
        (Method::DELETE, [id, "students"]) => handle_remove(req, state, id).await,
        (Method::PUT, [id, "students", sid, "status"]) => {
            handle_update_status(req, state, id, sid).await
        }

        (Method::POST, [id, "reconcile", job]) => handle_reconcile(state, id, job).await,

        (Method::GET, [id, "groups"]) => groups::handle_list_by_mission(state, id).await,
        (Method::POST, [id, "groups"]) => groups::handle_create(req, state, id).await,

        (Method::GET, [id, "mentors"]) => mentors::handle_list(state, id).await,
        (Method::POST, [id, "mentors"]) => mentors::handle_assign(req, state, id).await,
        (Method::POST, [id, "mentors", "recount"]) => mentors::handle_recount(state, id).await,

        _ => error_response(StatusCode::NOT_FOUND, "Not found", None),
    }
}

// =============================================================================
// Mission CRUD Handlers
// =============================================================================

/// Get the missions collection, or a ready-made error response
async fn mission_collection(
    state: &AppState,
) -> Result<MongoCollection<MissionDoc>, Response<FullBody>> {
    let mongo = match &state.mongo {
        Some(m) => m,
        None => {
            return Err(error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Database not available",
                Some("DB_UNAVAILABLE"),
            ))
        }
    };

    mongo
        .collection::<MissionDoc>(MISSION_COLLECTION)
        .await
        .map_err(|e| {
            warn!("Error getting collection: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            )
        })
}

/// POST /missions - Create a mission
pub async fn handle_create_mission(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<FullBody> {
    let request: CreateMissionRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    if request.code.trim().is_empty()
        || request.title.trim().is_empty()
        || request.batch_id.trim().is_empty()
    {
        return error_response(
            StatusCode::BAD_REQUEST,
            "code, title, and batchId are required",
            Some("VALIDATION_ERROR"),
        );
    }

    let courses: Vec<MissionCourse> = request
        .courses
        .into_iter()
        .map(|c| MissionCourse {
            course_id: c.course_id,
            weight: c.weight,
            min_progress: c.min_progress,
        })
        .collect();

    if let Err(e) = validate_course_weights(&courses) {
        return error_response(StatusCode::BAD_REQUEST, &e, Some("VALIDATION_ERROR"));
    }

    let collection = match mission_collection(&state).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let mut mission = MissionDoc::new(request.code, request.title, request.batch_id, courses);
    mission.max_students = request.max_students.unwrap_or(0);

    let id = match collection.insert_one(mission).await {
        Ok(id) => id,
        Err(e) => {
            // Unique index on code: a duplicate insert surfaces as E11000
            let message = e.to_string();
            if message.contains("E11000") || message.contains("duplicate key") {
                return error_response(
                    StatusCode::CONFLICT,
                    "A mission with this code already exists",
                    Some("CONFLICT"),
                );
            }
            warn!("Error creating mission: {}", message);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    info!("Created mission {}", id.to_hex());

    match collection.find_one(doc! { "_id": id }).await {
        Ok(Some(created)) => json_response(StatusCode::CREATED, &MissionResponse::from(created)),
        Ok(None) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Created mission vanished",
            Some("INTERNAL_ERROR"),
        ),
        Err(e) => admin_error_response(e),
    }
}

/// GET /missions - List missions, newest first
pub async fn handle_list_missions(state: Arc<AppState>) -> Response<FullBody> {
    let collection = match mission_collection(&state).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let options = FindOptions::builder()
        .sort(doc! { "metadata.created_at": -1 })
        .build();

    let mut cursor = match collection
        .inner()
        .find(doc! { "metadata.is_deleted": { "$ne": true } })
        .with_options(options)
        .await
    {
        Ok(c) => c,
        Err(e) => {
            warn!("Error listing missions: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let mut missions = Vec::new();
    use futures::stream::StreamExt;
    while let Some(result) = cursor.next().await {
        if let Ok(mission) = result {
            missions.push(MissionResponse::from(mission));
        }
    }

    json_response(StatusCode::OK, &missions)
}

/// GET /missions/{id} - Mission details
async fn handle_get_mission(state: Arc<AppState>, mission_id: &str) -> Response<FullBody> {
    let collection = match mission_collection(&state).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let oid = match ObjectId::parse_str(mission_id) {
        Ok(o) => o,
        Err(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid mission id",
                Some("BAD_REQUEST"),
            )
        }
    };

    match collection.find_one(doc! { "_id": oid }).await {
        Ok(Some(mission)) => json_response(StatusCode::OK, &MissionResponse::from(mission)),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Mission not found", Some("NOT_FOUND")),
        Err(e) => admin_error_response(e),
    }
}

/// PUT /missions/{id}/status - Update mission status
///
/// Status is free assignment: any status may move to any other.
async fn handle_update_mission_status(
    req: Request<Incoming>,
    state: Arc<AppState>,
    mission_id: &str,
) -> Response<FullBody> {
    let request: UpdateMissionStatusRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let status = match MissionStatus::parse(&request.status) {
        Some(s) => s,
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid status. Must be draft, active, paused, completed, or archived",
                Some("VALIDATION_ERROR"),
            )
        }
    };

    let collection = match mission_collection(&state).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let oid = match ObjectId::parse_str(mission_id) {
        Ok(o) => o,
        Err(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid mission id",
                Some("BAD_REQUEST"),
            )
        }
    };

    let result = collection
        .update_one(
            doc! { "_id": oid },
            doc! {
                "$set": {
                    "status": status.as_str(),
                    "metadata.updated_at": DateTime::now(),
                }
            },
        )
        .await;

    match result {
        Ok(r) if r.matched_count > 0 => {
            info!("Mission {} set to {}", mission_id, status.as_str());
            match collection.find_one(doc! { "_id": oid }).await {
                Ok(Some(mission)) => {
                    json_response(StatusCode::OK, &MissionResponse::from(mission))
                }
                Ok(None) => error_response(
                    StatusCode::NOT_FOUND,
                    "Mission not found",
                    Some("NOT_FOUND"),
                ),
                Err(e) => admin_error_response(e),
            }
        }
        Ok(_) => error_response(StatusCode::NOT_FOUND, "Mission not found", Some("NOT_FOUND")),
        Err(e) => admin_error_response(e),
    }
}

// =============================================================================
// Endpoint Handlers
// =============================================================================

/// GET /missions/{id}/students - Active roster
async fn handle_roster(state: Arc<AppState>, mission_id: &str) -> Response<FullBody> {
    let manager = match state.require_enrollment() {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    match manager.roster(mission_id).await {
        Ok(roster) => {
            let body: Vec<RosterEntryResponse> = roster.into_iter().map(Into::into).collect();
            json_response(StatusCode::OK, &body)
        }
        Err(e) => admin_error_response(e),
    }
}

/// POST /missions/{id}/students - Enroll students
async fn handle_enroll(
    req: Request<Incoming>,
    state: Arc<AppState>,
    mission_id: &str,
) -> Response<FullBody> {
    let manager = match state.require_enrollment() {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    let request: EnrollRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match manager.enroll(mission_id, &request.student_ids).await {
        Ok(outcome) => json_response(StatusCode::OK, &EnrollResponse::from(outcome)),
        Err(e) => admin_error_response(e),
    }
}

/// DELETE /missions/{id}/students - Soft-remove students
async fn handle_remove(
    req: Request<Incoming>,
    state: Arc<AppState>,
    mission_id: &str,
) -> Response<FullBody> {
    let manager = match state.require_enrollment() {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    let request: EnrollRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match manager.remove(mission_id, &request.student_ids).await {
        Ok(outcome) => json_response(StatusCode::OK, &RemoveResponse::from(outcome)),
        Err(e) => admin_error_response(e),
    }
}

/// PUT /missions/{id}/students/{sid}/status - Update status/progress
async fn handle_update_status(
    req: Request<Incoming>,
    state: Arc<AppState>,
    mission_id: &str,
    student_id: &str,
) -> Response<FullBody> {
    let manager = match state.require_enrollment() {
        Ok(m) => m,
        Err(resp) => return resp,
    };

    let request: UpdateStatusRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let status = match EnrollmentStatus::parse(&request.status) {
        Some(s) => s,
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid status. Must be active, completed, failed, or dropped",
                Some("VALIDATION_ERROR"),
            )
        }
    };

    match manager
        .set_student_status(mission_id, student_id, status, request.progress)
        .await
    {
        Ok(record) => json_response(StatusCode::OK, &RecordResponse::from(record)),
        Err(e) => admin_error_response(e),
    }
}

/// POST /missions/{id}/reconcile/{job} - Run a repair job
async fn handle_reconcile(
    state: Arc<AppState>,
    mission_id: &str,
    job: &str,
) -> Response<FullBody> {
    let reconciler = match state.require_reconciler() {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match job {
        "fix" => match reconciler.fix(mission_id).await {
            Ok(changed_count) => {
                json_response(StatusCode::OK, &FixResponse { changed_count })
            }
            Err(e) => admin_error_response(e),
        },
        "sync" => match reconciler.sync(mission_id).await {
            Ok(outcome) => json_response(
                StatusCode::OK,
                &SyncResponse {
                    synced_count: outcome.synced_count,
                    errors: outcome.errors,
                },
            ),
            Err(e) => admin_error_response(e),
        },
        "clear" => match reconciler.clear(mission_id).await {
            Ok(updated_count) => {
                json_response(StatusCode::OK, &ClearResponse { updated_count })
            }
            Err(e) => admin_error_response(e),
        },
        "recount" => match reconciler.recount(mission_id).await {
            Ok(outcome) => json_response(
                StatusCode::OK,
                &RecountResponse {
                    mentors: outcome.mentors,
                    groups: outcome.groups,
                },
            ),
            Err(e) => admin_error_response(e),
        },
        _ => error_response(
            StatusCode::NOT_FOUND,
            "Unknown reconcile job. Must be fix, sync, clear, or recount",
            None,
        ),
    }
}
