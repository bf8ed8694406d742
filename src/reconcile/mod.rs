//! Reconciliation jobs
//!
//! Idempotent repair operations for drift between the denormalized
//! representations. The consistency layer does not wrap multi-document
//! mutations in transactions; these jobs are the compensating mechanism.

mod jobs;

pub use jobs::{plan_sync_entry, Reconciler, RecountOutcome, SyncOutcome};
