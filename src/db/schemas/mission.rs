//! Mission document schema
//!
//! A mission is a cohort learning program: a batch of students working
//! through a weighted course list. The embedded `students` array is a
//! legacy representation kept for backward compatibility; `student_missions`
//! is the canonical enrollment collection and the embedded array is never
//! written going forward (see `reconcile::sync`).

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for missions
pub const MISSION_COLLECTION: &str = "missions";

/// Mission lifecycle status. Transitions are free assignment: any status
/// may move to any other.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Completed,
    Archived,
}

impl MissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// One course within a mission's course list
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct MissionCourse {
    /// Course identifier
    pub course_id: String,

    /// Weight toward overall mission progress (all weights sum to 100)
    pub weight: u32,

    /// Minimum per-course progress required to count as passing
    #[serde(default)]
    pub min_progress: u32,
}

/// Legacy embedded enrollment entry on the mission document.
///
/// Fields are loosely typed because historical data predates validation;
/// `reconcile::sync` parses these defensively and collects per-entry errors.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct EmbeddedStudent {
    #[serde(default)]
    pub student_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentor_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime>,
}

/// Mission document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct MissionDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Short unique mission code (e.g. "RUST-2024-1")
    pub code: String,

    /// Display title
    pub title: String,

    /// Lifecycle status
    #[serde(default)]
    pub status: MissionStatus,

    /// Batch this mission draws its students from
    pub batch_id: String,

    /// Weighted course list
    #[serde(default)]
    pub courses: Vec<MissionCourse>,

    /// Maximum student count (0 = unlimited)
    #[serde(default)]
    pub max_students: i64,

    /// Legacy embedded enrollment array (deprecated, read-only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub students: Vec<EmbeddedStudent>,
}

impl MissionDoc {
    /// Create a new mission document
    pub fn new(code: String, title: String, batch_id: String, courses: Vec<MissionCourse>) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            code,
            title,
            status: MissionStatus::Draft,
            batch_id,
            courses,
            max_students: 0,
            students: Vec::new(),
        }
    }

    /// Hex string form of the document id, used as the mission reference in
    /// related collections
    pub fn id_hex(&self) -> String {
        self._id.map(|o| o.to_hex()).unwrap_or_default()
    }
}

/// Validate that course weights sum to exactly 100.
///
/// An empty course list is allowed (missions are created before their
/// course plan is finalized).
pub fn validate_course_weights(courses: &[MissionCourse]) -> Result<(), String> {
    if courses.is_empty() {
        return Ok(());
    }

    let total: u32 = courses.iter().map(|c| c.weight).sum();
    if total != 100 {
        return Err(format!("course weights must sum to 100, got {}", total));
    }

    Ok(())
}

impl IntoIndexes for MissionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on mission code
            (
                doc! { "code": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("code_unique".to_string())
                        .build(),
                ),
            ),
            // Index on batch for cohort listings
            (
                doc! { "batch_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("batch_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for MissionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(id: &str, weight: u32) -> MissionCourse {
        MissionCourse {
            course_id: id.to_string(),
            weight,
            min_progress: 0,
        }
    }

    #[test]
    fn test_weights_must_sum_to_100() {
        assert!(validate_course_weights(&[course("a", 60), course("b", 40)]).is_ok());
        assert!(validate_course_weights(&[course("a", 60), course("b", 50)]).is_err());
        assert!(validate_course_weights(&[course("a", 100)]).is_ok());
    }

    #[test]
    fn test_empty_course_list_is_valid() {
        assert!(validate_course_weights(&[]).is_ok());
    }

    #[test]
    fn test_status_round_trip() {
        for s in ["draft", "active", "paused", "completed", "archived"] {
            assert_eq!(MissionStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(MissionStatus::parse("bogus").is_none());
    }
}
