//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Routing is a manual
//! (method, path) match dispatching into the route modules.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::Args;
use crate::db::MongoClient;
use crate::enrollment::EnrollmentManager;
use crate::groups::GroupManager;
use crate::reconcile::Reconciler;
use crate::routes;
use crate::routes::{error_response, FullBody};
use crate::services::{MongoBatchMembership, MongoUserDirectory, UserDirectory};
use crate::types::AdminError;
use crate::workload::WorkloadTracker;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: Option<MongoClient>,
    /// Enrollment manager (absent when running without a database)
    pub enrollment: Option<Arc<EnrollmentManager>>,
    /// Group membership manager
    pub groups: Option<Arc<GroupManager>>,
    /// Mentor workload tracker
    pub workload: Option<Arc<WorkloadTracker>>,
    /// Reconciliation jobs
    pub reconciler: Option<Arc<Reconciler>>,
    /// User directory for display resolution
    pub users: Option<Arc<dyn UserDirectory>>,
}

impl AppState {
    /// Create AppState without a database (dev mode). Mutating routes
    /// return 503 until a database is wired in.
    pub fn new(args: Args) -> Self {
        Self {
            args,
            mongo: None,
            enrollment: None,
            groups: None,
            workload: None,
            reconciler: None,
            users: None,
        }
    }

    /// Create AppState with all managers wired to MongoDB
    pub async fn with_database(args: Args, mongo: MongoClient) -> Result<Self, AdminError> {
        let batch = Arc::new(MongoBatchMembership::new(&mongo).await?);
        let users = Arc::new(MongoUserDirectory::new(&mongo).await?);
        let workload = Arc::new(WorkloadTracker::new(&mongo).await?);

        let enrollment = Arc::new(
            EnrollmentManager::new(
                &mongo,
                batch.clone(),
                users.clone(),
                Arc::clone(&workload),
            )
            .await?,
        );
        let groups = Arc::new(GroupManager::new(&mongo, Arc::clone(&workload)).await?);
        let reconciler = Arc::new(Reconciler::new(&mongo, batch, Arc::clone(&workload)).await?);

        Ok(Self {
            args,
            mongo: Some(mongo),
            enrollment: Some(enrollment),
            groups: Some(groups),
            workload: Some(workload),
            reconciler: Some(reconciler),
            users: Some(users),
        })
    }

    pub fn require_enrollment(
        &self,
    ) -> Result<Arc<EnrollmentManager>, Response<FullBody>> {
        self.enrollment.clone().ok_or_else(db_unavailable)
    }

    pub fn require_groups(&self) -> Result<Arc<GroupManager>, Response<FullBody>> {
        self.groups.clone().ok_or_else(db_unavailable)
    }

    pub fn require_workload(&self) -> Result<Arc<WorkloadTracker>, Response<FullBody>> {
        self.workload.clone().ok_or_else(db_unavailable)
    }

    pub fn require_reconciler(&self) -> Result<Arc<Reconciler>, Response<FullBody>> {
        self.reconciler.clone().ok_or_else(db_unavailable)
    }

    pub fn require_users(&self) -> Result<Arc<dyn UserDirectory>, Response<FullBody>> {
        self.users.clone().ok_or_else(db_unavailable)
    }
}

fn db_unavailable() -> Response<FullBody> {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "Database not available",
        Some("DB_UNAVAILABLE"),
    )
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), AdminError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "mission-control listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - database is optional");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Accept error: {}", e);
            }
        }
    }
}

/// Route an incoming request
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("{} {} from {}", method, path, addr);

    let response = match (method, path.as_str()) {
        (Method::GET, "/health") | (Method::GET, "/healthz") => routes::health_check(state),
        (Method::GET, "/ready") | (Method::GET, "/readyz") => routes::readiness_check(state),
        (Method::GET, "/version") => routes::version_info(),

        (Method::OPTIONS, _) => preflight_response(),

        (Method::GET, "/missions") => routes::handle_list_missions(state).await,
        (Method::POST, "/missions") => routes::handle_create_mission(req, state).await,

        (_, p) if p.starts_with("/missions/") => {
            routes::handle_mission_request(req, state, &path).await
        }
        (_, p) if p.starts_with("/groups/") => {
            routes::handle_group_request(req, state, &path).await
        }
        (_, p) if p == "/users" || p.starts_with("/users/") => {
            routes::handle_user_request(req, state, &path).await
        }

        _ => not_found_response(&path),
    };

    Ok(response)
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, PATCH, DELETE, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
