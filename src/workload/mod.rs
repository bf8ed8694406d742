//! Mentor workload tracking

mod tracker;

pub use tracker::{count_distinct_students, AssignOutcome, WorkloadTracker};
