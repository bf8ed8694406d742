//! Batch membership schema
//!
//! Records a student's membership application to a batch (cohort intake).
//! Enrollment into a mission requires an approved record for the mission's
//! batch.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for batch memberships
pub const BATCH_MEMBER_COLLECTION: &str = "batch_members";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchMemberStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Withdrawn,
}

impl BatchMemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        }
    }
}

/// Batch membership document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct BatchMemberDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Batch reference
    pub batch_id: String,

    /// Student reference
    pub student_id: String,

    #[serde(default)]
    pub status: BatchMemberStatus,
}

impl BatchMemberDoc {
    pub fn new(batch_id: String, student_id: String, status: BatchMemberStatus) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            batch_id,
            student_id,
            status,
        }
    }
}

impl IntoIndexes for BatchMemberDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "batch_id": 1, "student_id": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("batch_student_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for BatchMemberDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
