//! Student enrollment record schema
//!
//! One document per student-mission membership. At most one non-dropped
//! record may exist per (student, mission) pair; dropping is a soft status
//! flip, and a later re-enroll creates a fresh active record while the
//! dropped one is retained as history.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for enrollment records
pub const STUDENT_MISSION_COLLECTION: &str = "student_missions";

/// Enrollment status. All states are reachable from all states: status is
/// plain assignment, not a guarded state machine.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    #[default]
    Active,
    Completed,
    Failed,
    Dropped,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Dropped => "dropped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "dropped" => Some(Self::Dropped),
            _ => None,
        }
    }
}

/// Per-course progress breakdown
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CourseProgress {
    pub course_id: String,
    pub progress: i32,
}

/// Enrollment record stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct StudentMissionDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Student reference
    pub student_id: String,

    /// Mission reference (hex ObjectId of the mission document)
    pub mission_id: String,

    /// Batch the student enrolled under
    pub batch_id: String,

    /// Direct mentor assignment (nullable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentor_id: Option<String>,

    /// Denormalized pointer to the mentorship group containing this student.
    /// The group's student list is canonical; this field is maintained
    /// alongside group mutations for cheap lookups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentorship_group_id: Option<String>,

    /// Enrollment status
    #[serde(default)]
    pub status: EnrollmentStatus,

    /// Overall progress, 0-100
    #[serde(default)]
    pub progress: i32,

    /// When the student started the mission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime>,

    /// Stamped on transition to completed; never cleared afterwards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime>,

    /// Stamped on transition to dropped; never cleared afterwards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropped_at: Option<DateTime>,

    /// Last mutation of this record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_at: Option<DateTime>,

    /// Per-course progress breakdown
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub course_progress: Vec<CourseProgress>,
}

impl StudentMissionDoc {
    /// Create a fresh active enrollment
    pub fn new(student_id: String, mission_id: String, batch_id: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            student_id,
            mission_id,
            batch_id,
            mentor_id: None,
            mentorship_group_id: None,
            status: EnrollmentStatus::Active,
            progress: 0,
            started_at: Some(DateTime::now()),
            completed_at: None,
            dropped_at: None,
            last_activity_at: Some(DateTime::now()),
            course_progress: Vec::new(),
        }
    }

    /// Whether this record counts toward the active roster
    pub fn is_enrolled(&self) -> bool {
        self.status != EnrollmentStatus::Dropped
    }
}

impl IntoIndexes for StudentMissionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Enrollment lookups are always scoped to a mission. Not unique:
            // dropped history records share the (mission, student) pair.
            (
                doc! { "mission_id": 1, "student_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("mission_student_index".to_string())
                        .build(),
                ),
            ),
            // Roster queries filter by status within a mission
            (
                doc! { "mission_id": 1, "status": 1 },
                Some(
                    IndexOptions::builder()
                        .name("mission_status_index".to_string())
                        .build(),
                ),
            ),
            // Workload recomputation scans by mentor
            (
                doc! { "mentor_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("mentor_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for StudentMissionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_active() {
        let rec = StudentMissionDoc::new("s1".into(), "m1".into(), "b1".into());
        assert_eq!(rec.status, EnrollmentStatus::Active);
        assert_eq!(rec.progress, 0);
        assert!(rec.mentor_id.is_none());
        assert!(rec.is_enrolled());
    }

    #[test]
    fn test_dropped_is_not_enrolled() {
        let mut rec = StudentMissionDoc::new("s1".into(), "m1".into(), "b1".into());
        rec.status = EnrollmentStatus::Dropped;
        assert!(!rec.is_enrolled());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            EnrollmentStatus::parse("dropped"),
            Some(EnrollmentStatus::Dropped)
        );
        assert!(EnrollmentStatus::parse("deleted").is_none());
    }
}
