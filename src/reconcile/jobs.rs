//! Repair jobs: fix, sync, clear, recount
//!
//! All jobs are idempotent: running one twice produces the same end state
//! as running it once, and none fails the whole call for a single bad
//! record.

use std::collections::HashSet;
use std::sync::Arc;

use bson::{doc, oid::ObjectId, DateTime};
use tracing::{info, warn};

use crate::db::schemas::{
    EmbeddedStudent, EnrollmentStatus, MentorshipGroupDoc, MissionDoc, StudentMissionDoc,
    GROUP_COLLECTION, MISSION_COLLECTION, STUDENT_MISSION_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::enrollment::clamp_progress;
use crate::services::BatchMembership;
use crate::types::{AdminError, Result};
use crate::workload::WorkloadTracker;

/// Result of a `sync` run
#[derive(Debug, Default)]
pub struct SyncOutcome {
    /// Records created from embedded entries
    pub synced_count: usize,
    /// Per-entry failures, collected without aborting the run
    pub errors: Vec<String>,
}

/// Result of a `recount` run
#[derive(Debug, Default)]
pub struct RecountOutcome {
    /// Mentor assignments recomputed
    pub mentors: usize,
    /// Group counters refreshed
    pub groups: usize,
}

/// Decide what a single embedded entry becomes during `sync`.
///
/// Returns `Ok(None)` when a record (of any status) already exists for the
/// student; sync never overwrites. Malformed entries produce an error
/// string for the caller's error list.
pub fn plan_sync_entry(
    entry: &EmbeddedStudent,
    mission_id: &str,
    batch_id: &str,
    existing: &HashSet<String>,
) -> std::result::Result<Option<StudentMissionDoc>, String> {
    if entry.student_id.trim().is_empty() {
        return Err("embedded entry missing student id".to_string());
    }

    if existing.contains(&entry.student_id) {
        return Ok(None);
    }

    let status = match entry.status.as_deref() {
        None => EnrollmentStatus::Active,
        Some(s) => EnrollmentStatus::parse(s)
            .ok_or_else(|| format!("{}: unknown status '{}'", entry.student_id, s))?,
    };

    let mut record = StudentMissionDoc::new(
        entry.student_id.clone(),
        mission_id.to_string(),
        batch_id.to_string(),
    );
    record.status = status;
    record.progress = clamp_progress(entry.progress.unwrap_or(0));
    record.mentor_id = entry.mentor_id.clone();
    if entry.started_at.is_some() {
        record.started_at = entry.started_at;
    }

    Ok(Some(record))
}

/// Reconciliation jobs backed by MongoDB
pub struct Reconciler {
    missions: MongoCollection<MissionDoc>,
    enrollments: MongoCollection<StudentMissionDoc>,
    groups: MongoCollection<MentorshipGroupDoc>,
    batch: Arc<dyn BatchMembership>,
    workload: Arc<WorkloadTracker>,
}

impl Reconciler {
    pub async fn new(
        mongo: &MongoClient,
        batch: Arc<dyn BatchMembership>,
        workload: Arc<WorkloadTracker>,
    ) -> Result<Self> {
        Ok(Self {
            missions: mongo.collection::<MissionDoc>(MISSION_COLLECTION).await?,
            enrollments: mongo
                .collection::<StudentMissionDoc>(STUDENT_MISSION_COLLECTION)
                .await?,
            groups: mongo
                .collection::<MentorshipGroupDoc>(GROUP_COLLECTION)
                .await?,
            batch,
            workload,
        })
    }

    async fn get_mission(&self, mission_id: &str) -> Result<MissionDoc> {
        let oid = ObjectId::parse_str(mission_id)
            .map_err(|_| AdminError::BadRequest(format!("invalid mission id: {}", mission_id)))?;

        self.missions
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("mission {}", mission_id)))
    }

    /// Drop every non-dropped enrollment whose student no longer holds an
    /// approved membership in the mission's batch. Returns the number of
    /// records changed; 0 means already consistent.
    pub async fn fix(&self, mission_id: &str) -> Result<usize> {
        let mission = self.get_mission(mission_id).await?;
        let approved = self.batch.approved_members(&mission.batch_id).await?;

        let enrolled = self
            .enrollments
            .find_many(doc! {
                "mission_id": mission_id,
                "status": { "$ne": "dropped" },
            })
            .await?;

        let violating: Vec<String> = enrolled
            .into_iter()
            .filter(|r| !approved.contains(&r.student_id))
            .map(|r| r.student_id)
            .collect();

        if violating.is_empty() {
            info!("fix: mission {} already consistent", mission_id);
            return Ok(0);
        }

        let result = self
            .enrollments
            .update_many(
                doc! {
                    "mission_id": mission_id,
                    "student_id": { "$in": &violating },
                    "status": { "$ne": "dropped" },
                },
                doc! {
                    "$set": {
                        "status": "dropped",
                        "dropped_at": DateTime::now(),
                        "last_activity_at": DateTime::now(),
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;

        info!(
            "fix: dropped {} enrollment(s) without batch membership in mission {}",
            result.modified_count, mission_id
        );
        Ok(result.modified_count as usize)
    }

    /// One-way migration of the legacy embedded `students[]` array into the
    /// enrollment collection. Creates records only where none (of any
    /// status) exists; never overwrites. Malformed entries accumulate into
    /// the error list without aborting the remaining entries.
    pub async fn sync(&self, mission_id: &str) -> Result<SyncOutcome> {
        let mission = self.get_mission(mission_id).await?;

        // Any-status lookup: a dropped history record still blocks creation
        let existing: HashSet<String> = self
            .enrollments
            .find_many(doc! { "mission_id": mission_id })
            .await?
            .into_iter()
            .map(|r| r.student_id)
            .collect();

        let mut outcome = SyncOutcome::default();

        for entry in &mission.students {
            match plan_sync_entry(entry, mission_id, &mission.batch_id, &existing) {
                Ok(Some(record)) => match self.enrollments.insert_one(record).await {
                    Ok(_) => outcome.synced_count += 1,
                    Err(e) => outcome
                        .errors
                        .push(format!("{}: {}", entry.student_id, e)),
                },
                Ok(None) => {}
                Err(e) => outcome.errors.push(e),
            }
        }

        if !outcome.errors.is_empty() {
            warn!(
                "sync: {} entry failure(s) in mission {}",
                outcome.errors.len(),
                mission_id
            );
        }
        info!(
            "sync: created {} enrollment(s) from embedded array in mission {}",
            outcome.synced_count, mission_id
        );

        Ok(outcome)
    }

    /// Mark every non-dropped enrollment in the mission dropped. Used
    /// before a full re-import.
    pub async fn clear(&self, mission_id: &str) -> Result<usize> {
        self.get_mission(mission_id).await?;

        let result = self
            .enrollments
            .update_many(
                doc! {
                    "mission_id": mission_id,
                    "status": { "$ne": "dropped" },
                },
                doc! {
                    "$set": {
                        "status": "dropped",
                        "dropped_at": DateTime::now(),
                        "last_activity_at": DateTime::now(),
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;

        info!(
            "clear: dropped {} enrollment(s) in mission {}",
            result.modified_count, mission_id
        );
        Ok(result.modified_count as usize)
    }

    /// Refresh every derived counter in the mission: mentor workloads and
    /// group `current_students`. The natural follow-up after ad-hoc edits.
    pub async fn recount(&self, mission_id: &str) -> Result<RecountOutcome> {
        self.get_mission(mission_id).await?;

        let mut outcome = RecountOutcome {
            mentors: self.workload.recompute_mission(mission_id).await?,
            groups: 0,
        };

        let groups = self
            .groups
            .find_many(doc! { "mission_id": mission_id })
            .await?;

        for group in groups {
            let count = group.student_ids.len() as i64;
            if count == group.current_students {
                continue;
            }
            match self
                .groups
                .update_one(
                    doc! { "_id": group._id },
                    doc! {
                        "$set": {
                            "current_students": count,
                            "metadata.updated_at": DateTime::now(),
                        }
                    },
                )
                .await
            {
                Ok(_) => outcome.groups += 1,
                Err(e) => warn!("recount: group {} refresh failed: {}", group.id_hex(), e),
            }
        }

        info!(
            "recount: {} mentor(s), {} group counter(s) refreshed in mission {}",
            outcome.mentors, outcome.groups, mission_id
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(student_id: &str) -> EmbeddedStudent {
        EmbeddedStudent {
            student_id: student_id.to_string(),
            status: None,
            progress: None,
            mentor_id: None,
            started_at: None,
        }
    }

    #[test]
    fn test_sync_defaults_status_and_progress() {
        let record = plan_sync_entry(&entry("s1"), "m1", "b1", &HashSet::new())
            .unwrap()
            .unwrap();
        assert_eq!(record.status, EnrollmentStatus::Active);
        assert_eq!(record.progress, 0);
        assert_eq!(record.mission_id, "m1");
        assert_eq!(record.batch_id, "b1");
    }

    #[test]
    fn test_sync_copies_embedded_fields() {
        let mut e = entry("s1");
        e.status = Some("completed".to_string());
        e.progress = Some(100);
        e.mentor_id = Some("mentor1".to_string());

        let record = plan_sync_entry(&e, "m1", "b1", &HashSet::new())
            .unwrap()
            .unwrap();
        assert_eq!(record.status, EnrollmentStatus::Completed);
        assert_eq!(record.progress, 100);
        assert_eq!(record.mentor_id.as_deref(), Some("mentor1"));
    }

    #[test]
    fn test_sync_never_overwrites_existing() {
        // Second run: the record created by the first run blocks creation
        let existing: HashSet<String> = ["s1".to_string()].into_iter().collect();
        let planned = plan_sync_entry(&entry("s1"), "m1", "b1", &existing).unwrap();
        assert!(planned.is_none());
    }

    #[test]
    fn test_sync_collects_malformed_entries() {
        assert!(plan_sync_entry(&entry(""), "m1", "b1", &HashSet::new()).is_err());

        let mut bad_status = entry("s1");
        bad_status.status = Some("enrolled??".to_string());
        assert!(plan_sync_entry(&bad_status, "m1", "b1", &HashSet::new()).is_err());
    }

    #[test]
    fn test_sync_clamps_out_of_range_progress() {
        let mut e = entry("s1");
        e.progress = Some(250);
        let record = plan_sync_entry(&e, "m1", "b1", &HashSet::new())
            .unwrap()
            .unwrap();
        assert_eq!(record.progress, 100);
    }
}
