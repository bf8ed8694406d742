//! Mentor assignment schema
//!
//! One document per mentor-mission assignment. `current_students` is a
//! derived counter maintained by the workload tracker; it can drift when
//! multi-step mutations partially fail and is repaired by `recount`, not
//! enforced transactionally.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for mentor assignments
pub const MISSION_MENTOR_COLLECTION: &str = "mission_mentors";

/// Mentor role within a mission
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MentorRole {
    MissionLead,
    Coordinator,
    #[default]
    Advisor,
    Supervisor,
}

impl MentorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissionLead => "mission-lead",
            Self::Coordinator => "coordinator",
            Self::Advisor => "advisor",
            Self::Supervisor => "supervisor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mission-lead" => Some(Self::MissionLead),
            "coordinator" => Some(Self::Coordinator),
            "advisor" => Some(Self::Advisor),
            "supervisor" => Some(Self::Supervisor),
            _ => None,
        }
    }
}

/// Mentor availability status.
///
/// `overloaded` is a manual flag set by an admin; it is never derived from
/// the counter, even when `current_students` exceeds `max_students`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MentorStatus {
    #[default]
    Active,
    Deactive,
    Irregular,
    Overloaded,
    Unavailable,
}

impl MentorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deactive => "deactive",
            Self::Irregular => "irregular",
            Self::Overloaded => "overloaded",
            Self::Unavailable => "unavailable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "deactive" => Some(Self::Deactive),
            "irregular" => Some(Self::Irregular),
            "overloaded" => Some(Self::Overloaded),
            "unavailable" => Some(Self::Unavailable),
            _ => None,
        }
    }
}

/// Mentor assignment document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct MissionMentorDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Mission reference (hex ObjectId)
    pub mission_id: String,

    /// Mentor user reference
    pub mentor_id: String,

    #[serde(default)]
    pub role: MentorRole,

    /// Capacity limit (0 = unlimited)
    #[serde(default)]
    pub max_students: i64,

    /// Derived student count (see module docs)
    #[serde(default)]
    pub current_students: i64,

    #[serde(default)]
    pub status: MentorStatus,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specializations: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responsibilities: Vec<String>,

    /// Fraction of time the mentor is available, 0.0-1.0
    #[serde(default)]
    pub availability_rate: f64,
}

impl MissionMentorDoc {
    /// Create a new assignment
    pub fn new(mission_id: String, mentor_id: String, role: MentorRole) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            mission_id,
            mentor_id,
            role,
            max_students: 0,
            current_students: 0,
            status: MentorStatus::Active,
            specializations: Vec::new(),
            responsibilities: Vec::new(),
            availability_rate: 1.0,
        }
    }

    /// Capacity used as a percentage for UI display. Unlimited capacity
    /// (max_students == 0) always reads 0%.
    pub fn capacity_used_percent(&self) -> f64 {
        if self.max_students <= 0 {
            return 0.0;
        }
        (self.current_students as f64 / self.max_students as f64) * 100.0
    }
}

impl IntoIndexes for MissionMentorDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // One assignment per mentor per mission
            (
                doc! { "mission_id": 1, "mentor_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("mission_mentor_unique".to_string())
                        .build(),
                ),
            ),
            // Mentor dashboards list assignments across missions
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

impl MutMetadata for MissionMentorDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_percent_unlimited() {
        let mut doc = MissionMentorDoc::new("m1".into(), "mentor1".into(), MentorRole::Advisor);
        doc.max_students = 0;
        doc.current_students = 42;
        assert_eq!(doc.capacity_used_percent(), 0.0);
    }

    #[test]
    fn test_capacity_percent_over_limit() {
        let mut doc = MissionMentorDoc::new("m1".into(), "mentor1".into(), MentorRole::Advisor);
        doc.max_students = 4;
        doc.current_students = 6;
        // Over-capacity is reported, not clamped
        assert_eq!(doc.capacity_used_percent(), 150.0);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(
            MentorRole::parse("mission-lead"),
            Some(MentorRole::MissionLead)
        );
        assert!(MentorRole::parse("lead").is_none());
    }
}
