//! User directory endpoints
//!
//! ## Endpoints
//!
//! - `GET /users?role=student|mentor|admin` - List users by role
//! - `GET /users/{id}` - Resolve one user
//! - `POST /users` - Create a user (duplicate email is a conflict)

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::schemas::{UserDoc, UserRole, USER_COLLECTION};
use crate::routes::{admin_error_response, error_response, json_response, read_json, FullBody};
use crate::server::AppState;
use crate::services::UserInfo;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: &'static str,
}

impl From<UserInfo> for UserResponse {
    fn from(user: UserInfo) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role.as_str(),
        }
    }
}

/// Query parameters for listing users
#[derive(Debug, Default)]
struct ListUsersQuery {
    role: Option<String>,
}

impl ListUsersQuery {
    fn from_query_string(query: Option<&str>) -> Self {
        let mut params = Self::default();

        if let Some(q) = query {
            for pair in q.split('&') {
                if let Some((key, value)) = pair.split_once('=') {
                    let value = urlencoding::decode(value).unwrap_or_default();
                    if key == "role" {
                        params.role = Some(value.to_string());
                    }
                }
            }
        }

        params
    }
}

// =============================================================================
// Route Handler
// =============================================================================

/// Main handler for /users/* routes
pub async fn handle_user_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();

    let subpath = path.strip_prefix("/users").unwrap_or("");
    let segments: Vec<&str> = subpath.split('/').filter(|s| !s.is_empty()).collect();

    match (method, segments.as_slice()) {
        (Method::GET, []) => handle_list_users(req, state).await,
        (Method::POST, []) => handle_create_user(req, state).await,
        (Method::GET, [id]) => handle_get_user(state, id).await,
        _ => error_response(StatusCode::NOT_FOUND, "Not found", None),
    }
}

// =============================================================================
// Endpoint Handlers
// =============================================================================

/// GET /users?role=... - List users by role
async fn handle_list_users(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let directory = match state.require_users() {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    let params = ListUsersQuery::from_query_string(req.uri().query());

    let role = match params.role.as_deref() {
        Some(r) => match UserRole::parse(r) {
            Some(parsed) => parsed,
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "Invalid role. Must be student, mentor, or admin",
                    Some("VALIDATION_ERROR"),
                )
            }
        },
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Missing role query parameter",
                Some("VALIDATION_ERROR"),
            )
        }
    };

    match directory.list_by_role(role).await {
        Ok(users) => {
            let body: Vec<UserResponse> = users.into_iter().map(Into::into).collect();
            json_response(StatusCode::OK, &body)
        }
        Err(e) => admin_error_response(e),
    }
}

/// GET /users/{id} - Resolve one user
async fn handle_get_user(state: Arc<AppState>, user_id: &str) -> Response<FullBody> {
    let directory = match state.require_users() {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    match directory.resolve(user_id).await {
        Ok(Some(user)) => json_response(StatusCode::OK, &UserResponse::from(user)),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "User not found", Some("NOT_FOUND")),
        Err(e) => admin_error_response(e),
    }
}

/// POST /users - Create a user
async fn handle_create_user(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let request: CreateUserRequest = match read_json(req).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    if request.name.trim().is_empty() || request.email.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "name and email are required",
            Some("VALIDATION_ERROR"),
        );
    }

    let role = match request.role.as_deref() {
        None => UserRole::Student,
        Some(r) => match UserRole::parse(r) {
            Some(parsed) => parsed,
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "Invalid role. Must be student, mentor, or admin",
                    Some("VALIDATION_ERROR"),
                )
            }
        },
    };

    let mongo = match &state.mongo {
        Some(m) => m,
        None => {
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Database not available",
                Some("DB_UNAVAILABLE"),
            )
        }
    };

    let collection = match mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Error getting collection: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let user = UserDoc::new(request.name.clone(), request.email.clone(), role);

    match collection.insert_one(user).await {
        Ok(id) => {
            info!("Created user {} ({})", id.to_hex(), request.email);
            json_response(
                StatusCode::CREATED,
                &UserResponse {
                    id: id.to_hex(),
                    name: request.name,
                    email: request.email,
                    role: role.as_str(),
                },
            )
        }
        Err(e) => {
            // Unique index on email: duplicates surface as E11000
            let message = e.to_string();
            if message.contains("E11000") || message.contains("duplicate key") {
                return error_response(
                    StatusCode::CONFLICT,
                    "A user with this email already exists",
                    Some("CONFLICT"),
                );
            }
            warn!("Error creating user: {}", message);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            )
        }
    }
}
