//! HTTP routes for mission-control

pub mod groups;
pub mod health;
pub mod mentors;
pub mod missions;
pub mod users;

pub use groups::handle_group_request;
pub use health::{health_check, readiness_check, version_info};
pub use missions::{handle_create_mission, handle_list_missions, handle_mission_request};
pub use users::handle_user_request;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::AdminError;

pub type FullBody = Full<Bytes>;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Serialize a body as a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

/// Build an error response with a machine-readable code
pub fn error_response(status: StatusCode, error: &str, code: Option<&str>) -> Response<FullBody> {
    json_response(
        status,
        &ErrorResponse {
            error: error.to_string(),
            code: code.map(|c| c.to_string()),
        },
    )
}

/// Map an AdminError onto the standard error response shape
pub fn admin_error_response(err: AdminError) -> Response<FullBody> {
    let code = err.error_code();
    let (status, message) = err.into_status_code_and_body();
    error_response(status, &message, Some(code))
}

/// Read and deserialize a JSON request body
pub async fn read_json<T: DeserializeOwned>(
    req: Request<Incoming>,
) -> Result<T, Response<FullBody>> {
    let body_bytes = match req.into_body().collect().await {
        Ok(b) => b.to_bytes(),
        Err(_) => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "Invalid body",
                Some("BAD_REQUEST"),
            ))
        }
    };

    serde_json::from_slice(&body_bytes).map_err(|e| {
        error_response(
            StatusCode::BAD_REQUEST,
            &format!("Invalid JSON: {}", e),
            Some("BAD_REQUEST"),
        )
    })
}
