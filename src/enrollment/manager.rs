//! Enrollment manager
//!
//! Owns the `student_missions` collection. Enrollment preconditions are
//! validated in full before any write (see `plan`); removal additionally
//! cleans up group membership and mentor workload so the denormalized
//! representations stay consistent without transactions.

use std::collections::HashSet;
use std::sync::Arc;

use bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::FindOneOptions;
use tracing::{info, warn};

use crate::db::schemas::{
    EnrollmentStatus, MentorshipGroupDoc, MissionDoc, StudentMissionDoc, GROUP_COLLECTION,
    MISSION_COLLECTION, STUDENT_MISSION_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::enrollment::plan::{clamp_progress, plan_enroll, plan_remove};
use crate::services::{BatchMembership, UserDirectory};
use crate::types::{AdminError, Result};
use crate::workload::WorkloadTracker;

/// One student on a mission roster, resolved for display
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub student_id: String,
    pub name: Option<String>,
    pub status: EnrollmentStatus,
    pub progress: i32,
    pub mentor_id: Option<String>,
    pub mentorship_group_id: Option<String>,
}

/// Result of an enroll call
#[derive(Debug)]
pub struct EnrollOutcome {
    pub added_count: usize,
    pub already_enrolled: Vec<String>,
    pub roster: Vec<RosterEntry>,
}

/// Result of a remove call
#[derive(Debug)]
pub struct RemoveOutcome {
    pub removed_count: usize,
    pub not_enrolled: Vec<String>,
    pub roster: Vec<RosterEntry>,
}

/// Enrollment manager backed by MongoDB
pub struct EnrollmentManager {
    missions: MongoCollection<MissionDoc>,
    enrollments: MongoCollection<StudentMissionDoc>,
    groups: MongoCollection<MentorshipGroupDoc>,
    batch: Arc<dyn BatchMembership>,
    users: Arc<dyn UserDirectory>,
    workload: Arc<WorkloadTracker>,
}

impl EnrollmentManager {
    pub async fn new(
        mongo: &MongoClient,
        batch: Arc<dyn BatchMembership>,
        users: Arc<dyn UserDirectory>,
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
            users,
            workload,
        })
    }

    /// Fetch a mission by hex id
    pub async fn get_mission(&self, mission_id: &str) -> Result<MissionDoc> {
        let oid = ObjectId::parse_str(mission_id)
            .map_err(|_| AdminError::BadRequest(format!("invalid mission id: {}", mission_id)))?;

        self.missions
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("mission {}", mission_id)))
    }

    /// Student ids with a non-dropped record for the mission
    async fn enrolled_students(&self, mission_id: &str) -> Result<HashSet<String>> {
        let records = self
            .enrollments
            .find_many(doc! {
                "mission_id": mission_id,
                "status": { "$ne": "dropped" },
            })
            .await?;

        Ok(records.into_iter().map(|r| r.student_id).collect())
    }

    /// Enroll a batch of students into a mission.
    ///
    /// Validation (mission exists, no in-request duplicates, approved batch
    /// membership, not everyone already enrolled) happens before any write.
    /// Does not touch mentor counters; a fresh enrollment has no mentor.
    pub async fn enroll(&self, mission_id: &str, student_ids: &[String]) -> Result<EnrollOutcome> {
        let mission = self.get_mission(mission_id).await?;

        let approved = self.batch.approved_members(&mission.batch_id).await?;
        let enrolled = self.enrolled_students(mission_id).await?;
        let plan = plan_enroll(student_ids, &enrolled, &approved)?;

        let records: Vec<StudentMissionDoc> = plan
            .to_create
            .iter()
            .map(|sid| {
                StudentMissionDoc::new(
                    sid.clone(),
                    mission_id.to_string(),
                    mission.batch_id.clone(),
                )
            })
            .collect();

        let inserted = self.enrollments.insert_many(records).await?;

        info!(
            "Enrolled {} student(s) into mission {} ({} already enrolled)",
            inserted.len(),
            mission_id,
            plan.already_enrolled.len()
        );

        Ok(EnrollOutcome {
            added_count: inserted.len(),
            already_enrolled: plan.already_enrolled,
            roster: self.roster(mission_id).await?,
        })
    }

    /// Soft-remove a batch of students from a mission.
    ///
    /// Marks records dropped (never deletes), clears the students out of any
    /// group in the mission, and recomputes affected mentor workloads. Ids
    /// not enrolled are reported as warnings.
    pub async fn remove(&self, mission_id: &str, student_ids: &[String]) -> Result<RemoveOutcome> {
        self.get_mission(mission_id).await?;

        let enrolled = self.enrolled_students(mission_id).await?;
        let plan = plan_remove(student_ids, &enrolled)?;

        let result = self
            .enrollments
            .update_many(
                doc! {
                    "mission_id": mission_id,
                    "student_id": { "$in": &plan.to_drop },
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

        if !plan.not_enrolled.is_empty() {
            warn!(
                "Remove from mission {}: not enrolled, skipped: {}",
                mission_id,
                plan.not_enrolled.join(", ")
            );
        }

        self.evict_from_groups(mission_id, &plan.to_drop).await;

        info!(
            "Removed {} student(s) from mission {}",
            result.modified_count, mission_id
        );

        Ok(RemoveOutcome {
            removed_count: result.modified_count as usize,
            not_enrolled: plan.not_enrolled,
            roster: self.roster(mission_id).await?,
        })
    }

    /// Pull dropped students out of every group in the mission and recompute
    /// the workload of each affected mentor. Best-effort: failures here are
    /// logged and left for the `recount` reconciliation job.
    async fn evict_from_groups(&self, mission_id: &str, student_ids: &[String]) {
        let groups = match self
            .groups
            .find_many(doc! {
                "mission_id": mission_id,
                "student_ids": { "$in": student_ids },
            })
            .await
        {
            Ok(g) => g,
            Err(e) => {
                warn!("Group lookup failed while removing students: {}", e);
                return;
            }
        };

        for group in groups {
            let remaining: Vec<&String> = group
                .student_ids
                .iter()
                .filter(|id| !student_ids.contains(id))
                .collect();

            let update = doc! {
                "$pull": { "student_ids": { "$in": student_ids } },
                "$set": {
                    "current_students": remaining.len() as i64,
                    "metadata.updated_at": DateTime::now(),
                },
            };

            if let Err(e) = self
                .groups
                .update_one(doc! { "_id": group._id }, update)
                .await
            {
                warn!("Failed to evict students from group {}: {}", group.id_hex(), e);
                continue;
            }

            self.workload
                .recompute_mentors(mission_id, &group.mentor_ids)
                .await;
        }

        // Dropped records keep their group pointer cleared so a later
        // re-enroll starts unassigned
        if let Err(e) = self
            .enrollments
            .update_many(
                doc! {
                    "mission_id": mission_id,
                    "student_id": { "$in": student_ids },
                },
                doc! { "$unset": { "mentorship_group_id": "" } },
            )
            .await
        {
            warn!("Failed to clear group pointers: {}", e);
        }
    }

    /// Update one student's status/progress on a mission.
    ///
    /// Reuses the existing record, including re-activation of a dropped
    /// record. Any transition is allowed. `completed_at`/`dropped_at` are
    /// stamped on entry to their status and never cleared afterwards
    /// (intentional: the record keeps its full history).
    pub async fn set_student_status(
        &self,
        mission_id: &str,
        student_id: &str,
        status: EnrollmentStatus,
        progress: Option<i32>,
    ) -> Result<StudentMissionDoc> {
        let record = self
            .latest_record(mission_id, student_id)
            .await?
            .ok_or_else(|| {
                AdminError::NotFound(format!(
                    "enrollment for student {} in mission {}",
                    student_id, mission_id
                ))
            })?;

        let mut set = doc! {
            "status": status.as_str(),
            "last_activity_at": DateTime::now(),
            "metadata.updated_at": DateTime::now(),
        };

        if let Some(p) = progress {
            set.insert("progress", clamp_progress(p));
        }

        if status == EnrollmentStatus::Completed && record.status != EnrollmentStatus::Completed {
            set.insert("completed_at", DateTime::now());
        }
        if status == EnrollmentStatus::Dropped && record.status != EnrollmentStatus::Dropped {
            set.insert("dropped_at", DateTime::now());
        }

        self.enrollments
            .update_one(doc! { "_id": record._id }, doc! { "$set": set })
            .await?;

        info!(
            "Student {} in mission {} set to {}",
            student_id,
            mission_id,
            status.as_str()
        );

        self.enrollments
            .find_one(doc! { "_id": record._id })
            .await?
            .ok_or_else(|| AdminError::Internal("updated record vanished".into()))
    }

    /// Most recent record for (student, mission): the non-dropped one if it
    /// exists, otherwise the newest dropped record.
    async fn latest_record(
        &self,
        mission_id: &str,
        student_id: &str,
    ) -> Result<Option<StudentMissionDoc>> {
        if let Some(active) = self
            .enrollments
            .find_one(doc! {
                "mission_id": mission_id,
                "student_id": student_id,
                "status": { "$ne": "dropped" },
            })
            .await?
        {
            return Ok(Some(active));
        }

        let options = FindOneOptions::builder()
            .sort(doc! { "metadata.created_at": -1 })
            .build();

        self.enrollments
            .inner()
            .find_one(doc! {
                "mission_id": mission_id,
                "student_id": student_id,
                "metadata.is_deleted": { "$ne": true },
            })
            .with_options(options)
            .await
            .map_err(|e| AdminError::Database(format!("Find failed: {}", e)))
    }

    /// Active (non-dropped) roster with display names resolved
    pub async fn roster(&self, mission_id: &str) -> Result<Vec<RosterEntry>> {
        let records = self
            .enrollments
            .find_many(doc! {
                "mission_id": mission_id,
                "status": { "$ne": "dropped" },
            })
            .await?;

        let ids: Vec<String> = records.iter().map(|r| r.student_id.clone()).collect();
        let names = self.users.resolve_many(&ids).await.unwrap_or_else(|e| {
            warn!("User resolution failed for roster: {}", e);
            Default::default()
        });

        Ok(records
            .into_iter()
            .map(|r| RosterEntry {
                name: names.get(&r.student_id).map(|u| u.name.clone()),
                student_id: r.student_id,
                status: r.status,
                progress: r.progress,
                mentor_id: r.mentor_id,
                mentorship_group_id: r.mentorship_group_id,
            })
            .collect())
    }
}
