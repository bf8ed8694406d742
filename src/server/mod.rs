//! HTTP server for mission-control

mod http;

pub use http::{run, AppState};
