//! Group membership manager
//!
//! Owns the `mentorship_groups` collection. The group's `student_ids` list
//! is the canonical membership representation; the manager keeps the
//! denormalized `mentorship_group_id` pointer on enrollment records and the
//! mentor workload counters in step with every mutation.

use std::sync::Arc;

use bson::{doc, oid::ObjectId, DateTime};
use tracing::{info, warn};

use crate::db::schemas::{
    GroupStatus, MentorshipGroupDoc, MissionDoc, StudentMissionDoc, GROUP_COLLECTION,
    MISSION_COLLECTION, STUDENT_MISSION_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::types::{AdminError, Result};
use crate::workload::WorkloadTracker;

/// Parameters for creating a group
#[derive(Debug, Default)]
pub struct CreateGroup {
    pub name: String,
    pub description: Option<String>,
    pub max_students: Option<i64>,
    pub group_type: Option<String>,
    pub skill_level: Option<String>,
    pub meeting_schedule: Option<String>,
    pub channel: Option<String>,
}

/// Free-form metadata patch for a group
#[derive(Debug, Default)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<GroupStatus>,
    pub group_type: Option<String>,
    pub skill_level: Option<String>,
    pub meeting_schedule: Option<String>,
    pub channel: Option<String>,
    pub primary_mentor_id: Option<String>,
    pub max_students: Option<i64>,
}

/// Member ids to add to a group
#[derive(Debug, Default)]
pub struct AddMembers {
    pub student_ids: Vec<String>,
    pub mentor_ids: Vec<String>,
}

/// Decide which students may join. Rejects the whole batch when the
/// resulting membership would exceed capacity (no partial application).
/// Already-present ids are skipped and do not count against capacity twice.
pub fn plan_add_students(
    existing: &[String],
    requested: &[String],
    max_students: i64,
) -> Result<Vec<String>> {
    let mut fresh: Vec<String> = Vec::new();
    for id in requested {
        if !existing.contains(id) && !fresh.contains(id) {
            fresh.push(id.clone());
        }
    }

    if max_students > 0 && (existing.len() + fresh.len()) as i64 > max_students {
        return Err(AdminError::CapacityExceeded(format!(
            "group holds {} of {} students, cannot add {} more",
            existing.len(),
            max_students,
            fresh.len()
        )));
    }

    Ok(fresh)
}

/// Group membership manager backed by MongoDB
pub struct GroupManager {
    missions: MongoCollection<MissionDoc>,
    groups: MongoCollection<MentorshipGroupDoc>,
    enrollments: MongoCollection<StudentMissionDoc>,
    workload: Arc<WorkloadTracker>,
}

impl GroupManager {
    pub async fn new(mongo: &MongoClient, workload: Arc<WorkloadTracker>) -> Result<Self> {
        Ok(Self {
            missions: mongo.collection::<MissionDoc>(MISSION_COLLECTION).await?,
            groups: mongo
                .collection::<MentorshipGroupDoc>(GROUP_COLLECTION)
                .await?,
            enrollments: mongo
                .collection::<StudentMissionDoc>(STUDENT_MISSION_COLLECTION)
                .await?,
            workload,
        })
    }

    /// Fetch a group by hex id
    pub async fn get(&self, group_id: &str) -> Result<MentorshipGroupDoc> {
        let oid = ObjectId::parse_str(group_id)
            .map_err(|_| AdminError::BadRequest(format!("invalid group id: {}", group_id)))?;

        self.groups
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("group {}", group_id)))
    }

    /// List a mission's groups
    pub async fn list_by_mission(&self, mission_id: &str) -> Result<Vec<MentorshipGroupDoc>> {
        self.groups
            .find_many(doc! { "mission_id": mission_id })
            .await
    }

    /// Create a group within a mission. Name is required; group names are
    /// not unique within a mission.
    pub async fn create(&self, mission_id: &str, params: CreateGroup) -> Result<MentorshipGroupDoc> {
        if params.name.trim().is_empty() {
            return Err(AdminError::Validation("group name is required".into()));
        }

        let oid = ObjectId::parse_str(mission_id)
            .map_err(|_| AdminError::BadRequest(format!("invalid mission id: {}", mission_id)))?;
        let mission = self
            .missions
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("mission {}", mission_id)))?;

        let mut group = MentorshipGroupDoc::new(
            params.name,
            mission_id.to_string(),
            mission.batch_id,
        );
        group.description = params.description;
        group.max_students = params.max_students.unwrap_or(0);
        group.group_type = params.group_type;
        group.skill_level = params.skill_level;
        group.meeting_schedule = params.meeting_schedule;
        group.channel = params.channel;

        let id = self.groups.insert_one(group).await?;
        info!("Created group {} in mission {}", id.to_hex(), mission_id);

        self.get(&id.to_hex()).await
    }

    /// Add students and/or mentors to a group.
    ///
    /// Student adds are all-or-nothing against capacity; mentor adds have no
    /// precondition beyond the group existing. Side effects: group counter,
    /// enrollment group pointers, and mentor workloads are all recomputed.
    pub async fn add_members(&self, group_id: &str, members: AddMembers) -> Result<MentorshipGroupDoc> {
        let group = self.get(group_id).await?;

        let new_students =
            plan_add_students(&group.student_ids, &members.student_ids, group.max_students)?;

        let new_mentors: Vec<String> = members
            .mentor_ids
            .iter()
            .filter(|id| !group.mentor_ids.contains(id))
            .cloned()
            .collect();

        if new_students.is_empty() && new_mentors.is_empty() {
            return Ok(group);
        }

        let student_count = (group.student_ids.len() + new_students.len()) as i64;
        self.groups
            .update_one(
                doc! { "_id": group._id },
                doc! {
                    "$addToSet": {
                        "student_ids": { "$each": &new_students },
                        "mentor_ids": { "$each": &new_mentors },
                    },
                    "$set": {
                        "current_students": student_count,
                        "metadata.updated_at": DateTime::now(),
                    },
                },
            )
            .await?;

        // Denormalized pointer: group list is canonical, enrollment records
        // cache their group for cheap lookups
        if !new_students.is_empty() {
            if let Err(e) = self
                .enrollments
                .update_many(
                    doc! {
                        "mission_id": &group.mission_id,
                        "student_id": { "$in": &new_students },
                        "status": { "$ne": "dropped" },
                    },
                    doc! {
                        "$set": {
                            "mentorship_group_id": group_id,
                            "metadata.updated_at": DateTime::now(),
                        }
                    },
                )
                .await
            {
                warn!("Failed to stamp group pointer on enrollments: {}", e);
            }
        }

        let mut affected_mentors = group.mentor_ids.clone();
        affected_mentors.extend(new_mentors.iter().cloned());
        self.workload
            .recompute_mentors(&group.mission_id, &affected_mentors)
            .await;

        info!(
            "Added {} student(s), {} mentor(s) to group {}",
            new_students.len(),
            new_mentors.len(),
            group_id
        );

        self.get(group_id).await
    }

    /// Remove a user (student or mentor) from a group. A no-op when the id
    /// is in neither list.
    pub async fn remove_member(&self, group_id: &str, user_id: &str) -> Result<MentorshipGroupDoc> {
        let group = self.get(group_id).await?;

        if group.student_ids.iter().any(|id| id == user_id) {
            let remaining = (group.student_ids.len() - 1) as i64;
            self.groups
                .update_one(
                    doc! { "_id": group._id },
                    doc! {
                        "$pull": { "student_ids": user_id },
                        "$set": {
                            "current_students": remaining,
                            "metadata.updated_at": DateTime::now(),
                        },
                    },
                )
                .await?;

            if let Err(e) = self
                .enrollments
                .update_many(
                    doc! {
                        "mission_id": &group.mission_id,
                        "student_id": user_id,
                        "mentorship_group_id": group_id,
                    },
                    doc! { "$unset": { "mentorship_group_id": "" } },
                )
                .await
            {
                warn!("Failed to clear group pointer for {}: {}", user_id, e);
            }

            self.workload
                .recompute_mentors(&group.mission_id, &group.mentor_ids)
                .await;

            info!("Removed student {} from group {}", user_id, group_id);
        } else if group.mentor_ids.iter().any(|id| id == user_id) {
            self.groups
                .update_one(
                    doc! { "_id": group._id },
                    doc! {
                        "$pull": { "mentor_ids": user_id },
                        "$set": { "metadata.updated_at": DateTime::now() },
                    },
                )
                .await?;

            if group.primary_mentor_id.as_deref() == Some(user_id) {
                warn!(
                    "Primary mentor {} removed from group {} member list",
                    user_id, group_id
                );
            }

            self.workload
                .recompute_mentors(&group.mission_id, &[user_id.to_string()])
                .await;

            info!("Removed mentor {} from group {}", user_id, group_id);
        }

        self.get(group_id).await
    }

    /// Free-form metadata update. Primary mentor membership is expected but
    /// not enforced: a mismatch is logged, not rejected.
    pub async fn update(&self, group_id: &str, patch: GroupPatch) -> Result<MentorshipGroupDoc> {
        let group = self.get(group_id).await?;

        let mut set = doc! { "metadata.updated_at": DateTime::now() };

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(AdminError::Validation("group name cannot be empty".into()));
            }
            set.insert("name", name);
        }
        if let Some(description) = patch.description {
            set.insert("description", description);
        }
        if let Some(status) = patch.status {
            set.insert("status", status.as_str());
        }
        if let Some(group_type) = patch.group_type {
            set.insert("group_type", group_type);
        }
        if let Some(skill_level) = patch.skill_level {
            set.insert("skill_level", skill_level);
        }
        if let Some(schedule) = patch.meeting_schedule {
            set.insert("meeting_schedule", schedule);
        }
        if let Some(channel) = patch.channel {
            set.insert("channel", channel);
        }
        if let Some(max_students) = patch.max_students {
            set.insert("max_students", max_students);
        }
        if let Some(primary) = patch.primary_mentor_id {
            if !group.mentor_ids.contains(&primary) {
                warn!(
                    "Primary mentor {} is not in group {} mentor list",
                    primary, group_id
                );
            }
            set.insert("primary_mentor_id", primary);
        }

        self.groups
            .update_one(doc! { "_id": group._id }, doc! { "$set": set })
            .await?;

        self.get(group_id).await
    }

    /// Soft-delete a group, clearing enrollment pointers and recomputing
    /// mentor workloads. A failure after the group is already deleted is
    /// reported as a partial cascade so the caller can rerun `recount`.
    pub async fn delete(&self, group_id: &str) -> Result<()> {
        let group = self.get(group_id).await?;

        self.groups.soft_delete(doc! { "_id": group._id }).await?;

        let cleared = self
            .enrollments
            .update_many(
                doc! {
                    "mission_id": &group.mission_id,
                    "mentorship_group_id": group_id,
                },
                doc! { "$unset": { "mentorship_group_id": "" } },
            )
            .await;

        if let Err(e) = cleared {
            return Err(AdminError::CascadeDeleteFailed(format!(
                "group {} deleted but pointer cleanup failed: {}",
                group_id, e
            )));
        }

        self.workload
            .recompute_mentors(&group.mission_id, &group.mentor_ids)
            .await;

        info!("Deleted group {} from mission {}", group_id, group.mission_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_within_capacity() {
        let fresh = plan_add_students(&ids(&["s1"]), &ids(&["s2", "s3"]), 3).unwrap();
        assert_eq!(fresh, ids(&["s2", "s3"]));
    }

    #[test]
    fn test_add_rejects_whole_batch_on_overflow() {
        // 2 existing + 2 new > 3: nothing is added, not even one
        let err = plan_add_students(&ids(&["s1", "s2"]), &ids(&["s3", "s4"]), 3);
        assert!(err.is_err());
    }

    #[test]
    fn test_unlimited_capacity() {
        let many: Vec<String> = (0..500).map(|i| format!("s{}", i)).collect();
        let fresh = plan_add_students(&[], &many, 0).unwrap();
        assert_eq!(fresh.len(), 500);
    }

    #[test]
    fn test_already_present_ids_do_not_count_twice() {
        // s1 is already a member: re-adding it is a no-op, so capacity 2 holds
        let fresh = plan_add_students(&ids(&["s1"]), &ids(&["s1", "s2"]), 2).unwrap();
        assert_eq!(fresh, ids(&["s2"]));
    }

    #[test]
    fn test_duplicate_ids_in_request_count_once() {
        let fresh = plan_add_students(&[], &ids(&["s1", "s1", "s2"]), 2).unwrap();
        assert_eq!(fresh, ids(&["s1", "s2"]));
    }
}
