//! Mentorship group document schema
//!
//! A sub-team of students and mentors within a mission. The group's
//! `student_ids` list is the canonical membership representation;
//! `student_missions.mentorship_group_id` is a denormalized pointer kept in
//! step by the group membership manager.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for mentorship groups
pub const GROUP_COLLECTION: &str = "mentorship_groups";

/// Group status
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    #[default]
    Active,
    Inactive,
    Full,
    Recruiting,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Full => "full",
            Self::Recruiting => "recruiting",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "full" => Some(Self::Full),
            "recruiting" => Some(Self::Recruiting),
            _ => None,
        }
    }
}

/// Mentorship group document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct MentorshipGroupDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Group name (required; not unique within a mission)
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Mission reference (hex ObjectId)
    pub mission_id: String,

    /// Batch reference, copied from the mission
    pub batch_id: String,

    /// Canonical student membership list
    #[serde(default)]
    pub student_ids: Vec<String>,

    /// Mentor membership list
    #[serde(default)]
    pub mentor_ids: Vec<String>,

    /// Primary mentor. Expected (not enforced) to appear in `mentor_ids`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_mentor_id: Option<String>,

    /// Capacity limit (0 = unlimited)
    #[serde(default)]
    pub max_students: i64,

    /// Derived count, kept equal to `student_ids.len()`
    #[serde(default)]
    pub current_students: i64,

    #[serde(default)]
    pub status: GroupStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_level: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_schedule: Option<String>,

    /// Communication channel (e.g. chat room link)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl MentorshipGroupDoc {
    /// Create a new group for a mission
    pub fn new(name: String, mission_id: String, batch_id: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            name,
            description: None,
            mission_id,
            batch_id,
            student_ids: Vec::new(),
            mentor_ids: Vec::new(),
            primary_mentor_id: None,
            max_students: 0,
            current_students: 0,
            status: GroupStatus::Active,
            group_type: None,
            skill_level: None,
            meeting_schedule: None,
            channel: None,
        }
    }

    /// Hex string form of the document id
    pub fn id_hex(&self) -> String {
        self._id.map(|o| o.to_hex()).unwrap_or_default()
    }
}

impl IntoIndexes for MentorshipGroupDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Groups are listed per mission
            (
                doc! { "mission_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("mission_id_index".to_string())
                        .build(),
                ),
            ),
            // Multikey index for "which group holds this student" lookups
            (
                doc! { "student_ids": 1 },
                Some(
                    IndexOptions::builder()
                        .name("student_ids_index".to_string())
                        .build(),
                ),
            ),
            // Workload recomputation scans groups by mentor
            (
                doc! { "mentor_ids": 1 },
                Some(
                    IndexOptions::builder()
                        .name("mentor_ids_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for MentorshipGroupDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
