//! mission-control - admin service for mission enrollment and
//! mentorship-group consistency
//!
//! The consistency layer keeps a student's enrollment status,
//! mentorship-group assignment, and mentor workload counters mutually
//! consistent across denormalized MongoDB collections.
//!
//! ## Components
//!
//! - **Enrollment**: batch enroll/remove/status updates on `student_missions`
//! - **Groups**: mentorship group membership with capacity enforcement
//! - **Workload**: derived `current_students` counters on mentor assignments
//! - **Reconcile**: idempotent repair jobs (fix, sync, clear, recount)

pub mod config;
pub mod db;
pub mod enrollment;
pub mod groups;
pub mod reconcile;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;
pub mod workload;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{AdminError, Result};
