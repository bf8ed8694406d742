//! Mentor workload tracker
//!
//! Maintains the derived `current_students` counter on mentor assignments.
//! A student can reach a mentor through two representations: a direct
//! `mentor_id` on the enrollment record, or membership in a group that
//! lists the mentor. The two can disagree, so the canonical count is the
//! de-duplicated union across both.
//!
//! The counter is advisory: `overloaded` status is set manually by admins
//! and is never derived here, even when the counter exceeds `max_students`.

use std::collections::HashSet;

use bson::{doc, DateTime};
use tracing::{info, warn};

use crate::db::schemas::{
    MentorRole, MentorshipGroupDoc, MissionMentorDoc, StudentMissionDoc, GROUP_COLLECTION,
    MISSION_MENTOR_COLLECTION, STUDENT_MISSION_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::types::Result;

/// Count distinct students across the direct-assignment and group-membership
/// representations. Students present in both count once.
pub fn count_distinct_students(direct: &[String], grouped: &[String]) -> usize {
    let mut seen: HashSet<&str> = direct.iter().map(String::as_str).collect();
    seen.extend(grouped.iter().map(String::as_str));
    seen.len()
}

/// Outcome of a bulk mentor assignment
#[derive(Debug, Default)]
pub struct AssignOutcome {
    /// Mentor ids newly assigned
    pub assigned: Vec<String>,
    /// Mentor ids that already had an assignment for this mission
    pub skipped: Vec<String>,
    /// Per-item failures, collected without aborting the batch
    pub errors: Vec<String>,
}

/// Workload tracker backed by MongoDB
pub struct WorkloadTracker {
    enrollments: MongoCollection<StudentMissionDoc>,
    groups: MongoCollection<MentorshipGroupDoc>,
    mentors: MongoCollection<MissionMentorDoc>,
}

impl WorkloadTracker {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            enrollments: mongo
                .collection::<StudentMissionDoc>(STUDENT_MISSION_COLLECTION)
                .await?,
            groups: mongo
                .collection::<MentorshipGroupDoc>(GROUP_COLLECTION)
                .await?,
            mentors: mongo
                .collection::<MissionMentorDoc>(MISSION_MENTOR_COLLECTION)
                .await?,
        })
    }

    /// Recompute `current_students` for one mentor in one mission.
    ///
    /// Returns the new count. Missing assignment documents are tolerated
    /// (the count is computed but nothing is written) so that group edits
    /// referencing an unassigned mentor do not fail the whole mutation.
    pub async fn recompute_mentor(&self, mission_id: &str, mentor_id: &str) -> Result<i64> {
        // Direct representation: enrollment records pointing at the mentor
        let direct: Vec<String> = self
            .enrollments
            .find_many(doc! {
                "mission_id": mission_id,
                "mentor_id": mentor_id,
                "status": { "$ne": "dropped" },
            })
            .await?
            .into_iter()
            .map(|e| e.student_id)
            .collect();

        // Group representation: students in any group listing the mentor
        let grouped: Vec<String> = self
            .groups
            .find_many(doc! { "mission_id": mission_id, "mentor_ids": mentor_id })
            .await?
            .into_iter()
            .flat_map(|g| g.student_ids)
            .collect();

        let count = count_distinct_students(&direct, &grouped) as i64;

        let result = self
            .mentors
            .update_one(
                doc! { "mission_id": mission_id, "mentor_id": mentor_id },
                doc! {
                    "$set": {
                        "current_students": count,
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;

        if result.matched_count == 0 {
            warn!(
                "No assignment record for mentor {} in mission {}, workload not persisted",
                mentor_id, mission_id
            );
        }

        Ok(count)
    }

    /// Recompute a set of mentors, best-effort: per-mentor failures are
    /// logged and do not abort the remaining recomputations.
    pub async fn recompute_mentors(&self, mission_id: &str, mentor_ids: &[String]) {
        for mentor_id in mentor_ids {
            if let Err(e) = self.recompute_mentor(mission_id, mentor_id).await {
                warn!(
                    "Workload recompute failed for mentor {} in mission {}: {}",
                    mentor_id, mission_id, e
                );
            }
        }
    }

    /// Recompute every mentor assigned to a mission. Returns the number of
    /// assignments recomputed.
    pub async fn recompute_mission(&self, mission_id: &str) -> Result<usize> {
        let assignments = self
            .mentors
            .find_many(doc! { "mission_id": mission_id })
            .await?;

        let mentor_ids: Vec<String> = assignments.into_iter().map(|a| a.mentor_id).collect();
        let count = mentor_ids.len();

        self.recompute_mentors(mission_id, &mentor_ids).await;

        info!(
            "Recomputed workload for {} mentor(s) in mission {}",
            count, mission_id
        );
        Ok(count)
    }

    /// Bulk-assign mentors to a mission with best-effort semantics: each id
    /// is processed independently and failures are collected, not fatal.
    /// Mentors already assigned are skipped, not re-created.
    pub async fn assign(
        &self,
        mission_id: &str,
        mentor_ids: &[String],
        role: MentorRole,
    ) -> Result<AssignOutcome> {
        let mut outcome = AssignOutcome::default();

        for mentor_id in mentor_ids {
            let existing = match self
                .mentors
                .find_one(doc! { "mission_id": mission_id, "mentor_id": mentor_id })
                .await
            {
                Ok(e) => e,
                Err(e) => {
                    outcome.errors.push(format!("{}: {}", mentor_id, e));
                    continue;
                }
            };

            if existing.is_some() {
                outcome.skipped.push(mentor_id.clone());
                continue;
            }

            let assignment =
                MissionMentorDoc::new(mission_id.to_string(), mentor_id.clone(), role);

            match self.mentors.insert_one(assignment).await {
                Ok(_) => outcome.assigned.push(mentor_id.clone()),
                Err(e) => outcome.errors.push(format!("{}: {}", mentor_id, e)),
            }
        }

        info!(
            "Assigned {} mentor(s) to mission {} ({} skipped, {} failed)",
            outcome.assigned.len(),
            mission_id,
            outcome.skipped.len(),
            outcome.errors.len()
        );

        Ok(outcome)
    }

    /// List a mission's mentor assignments
    pub async fn list_mission(&self, mission_id: &str) -> Result<Vec<MissionMentorDoc>> {
        self.mentors
            .find_many(doc! { "mission_id": mission_id })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_union_deduplicates_across_representations() {
        // s2 has both a direct mentor_id and group membership: counts once
        let direct = ids(&["s1", "s2"]);
        let grouped = ids(&["s2", "s3"]);
        assert_eq!(count_distinct_students(&direct, &grouped), 3);
    }

    #[test]
    fn test_union_with_empty_sides() {
        assert_eq!(count_distinct_students(&[], &[]), 0);
        assert_eq!(count_distinct_students(&ids(&["s1"]), &[]), 1);
        assert_eq!(count_distinct_students(&[], &ids(&["s1", "s1"])), 1);
    }

    #[test]
    fn test_duplicates_within_one_side() {
        // A student appearing in two of the mentor's groups still counts once
        let grouped = ids(&["s1", "s1", "s2"]);
        assert_eq!(count_distinct_students(&[], &grouped), 2);
    }
}
