//! Enrollment planning
//!
//! Pure decision logic for enroll/remove requests, separated from the
//! MongoDB mutations so the precondition rules are directly testable.
//! All checks run before any write: a rejected request mutates nothing.

use std::collections::HashSet;

use crate::types::{AdminError, Result};

/// Resolved plan for an enroll request
#[derive(Debug, PartialEq, Eq)]
pub struct EnrollPlan {
    /// Ids to create fresh active records for
    pub to_create: Vec<String>,
    /// Ids skipped because a non-dropped record already exists
    pub already_enrolled: Vec<String>,
}

/// Resolved plan for a remove request
#[derive(Debug, PartialEq, Eq)]
pub struct RemovePlan {
    /// Ids whose records will be marked dropped
    pub to_drop: Vec<String>,
    /// Ids reported as warnings: not currently enrolled
    pub not_enrolled: Vec<String>,
}

/// Ids appearing more than once in a single request
pub fn find_request_duplicates(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dups = Vec::new();
    for id in ids {
        if !seen.insert(id.as_str()) && !dups.contains(id) {
            dups.push(id.clone());
        }
    }
    dups
}

/// Clamp a progress value to the valid [0, 100] range
pub fn clamp_progress(progress: i32) -> i32 {
    progress.clamp(0, 100)
}

/// Plan an enroll request.
///
/// Rejects on: empty request, duplicate ids within the request, ids lacking
/// approved batch membership, or every id already enrolled. Already-enrolled
/// ids are otherwise skipped and reported, not errors.
pub fn plan_enroll(
    requested: &[String],
    enrolled: &HashSet<String>,
    approved: &HashSet<String>,
) -> Result<EnrollPlan> {
    if requested.is_empty() {
        return Err(AdminError::Validation("no student ids provided".into()));
    }

    let dups = find_request_duplicates(requested);
    if !dups.is_empty() {
        return Err(AdminError::Validation(format!(
            "duplicate student ids in request: {}",
            dups.join(", ")
        )));
    }

    let unapproved: Vec<&str> = requested
        .iter()
        .filter(|id| !approved.contains(id.as_str()))
        .map(String::as_str)
        .collect();
    if !unapproved.is_empty() {
        return Err(AdminError::Validation(format!(
            "students without approved batch membership: {}",
            unapproved.join(", ")
        )));
    }

    let mut plan = EnrollPlan {
        to_create: Vec::new(),
        already_enrolled: Vec::new(),
    };
    for id in requested {
        if enrolled.contains(id) {
            plan.already_enrolled.push(id.clone());
        } else {
            plan.to_create.push(id.clone());
        }
    }

    if plan.to_create.is_empty() {
        return Err(AdminError::Validation(
            "all requested students are already enrolled".into(),
        ));
    }

    Ok(plan)
}

/// Plan a remove request.
///
/// Ids not currently enrolled are warnings, not errors, unless no
/// requested id is enrolled, in which case the whole call is rejected.
pub fn plan_remove(requested: &[String], enrolled: &HashSet<String>) -> Result<RemovePlan> {
    if requested.is_empty() {
        return Err(AdminError::Validation("no student ids provided".into()));
    }

    let mut plan = RemovePlan {
        to_drop: Vec::new(),
        not_enrolled: Vec::new(),
    };
    for id in requested {
        if enrolled.contains(id) {
            if !plan.to_drop.contains(id) {
                plan.to_drop.push(id.clone());
            }
        } else if !plan.not_enrolled.contains(id) {
            plan.not_enrolled.push(id.clone());
        }
    }

    if plan.to_drop.is_empty() {
        return Err(AdminError::Validation(
            "none of the requested students are enrolled".into(),
        ));
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn set(v: &[&str]) -> HashSet<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_enroll_fresh_batch() {
        let plan = plan_enroll(
            &ids(&["s1", "s2", "s3"]),
            &HashSet::new(),
            &set(&["s1", "s2", "s3"]),
        )
        .unwrap();
        assert_eq!(plan.to_create, ids(&["s1", "s2", "s3"]));
        assert!(plan.already_enrolled.is_empty());
    }

    #[test]
    fn test_enroll_rejects_duplicate_ids_in_request() {
        let err = plan_enroll(
            &ids(&["s1", "s1"]),
            &HashSet::new(),
            &set(&["s1"]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("s1"));
    }

    #[test]
    fn test_enroll_rejects_unapproved_and_lists_them() {
        // s4 lacks batch approval: whole request rejected, s1 not created
        let err = plan_enroll(
            &ids(&["s1", "s4"]),
            &HashSet::new(),
            &set(&["s1", "s2", "s3"]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("s4"));
        assert!(!err.to_string().contains("s1,"));
    }

    #[test]
    fn test_enroll_skips_already_enrolled() {
        let plan = plan_enroll(
            &ids(&["s1", "s2"]),
            &set(&["s1"]),
            &set(&["s1", "s2"]),
        )
        .unwrap();
        assert_eq!(plan.to_create, ids(&["s2"]));
        assert_eq!(plan.already_enrolled, ids(&["s1"]));
    }

    #[test]
    fn test_enroll_fails_when_all_already_enrolled() {
        let err = plan_enroll(&ids(&["s1", "s2"]), &set(&["s1", "s2"]), &set(&["s1", "s2"]));
        assert!(err.is_err());
    }

    #[test]
    fn test_reenroll_of_same_set_is_rejected_whole() {
        // Property: enroll(M, S) twice leaves roster at |S|. The second call
        // is rejected outright, creating nothing.
        let approved = set(&["s1", "s2", "s3"]);
        let first = plan_enroll(&ids(&["s1", "s2", "s3"]), &HashSet::new(), &approved).unwrap();
        let enrolled: HashSet<String> = first.to_create.iter().cloned().collect();
        assert!(plan_enroll(&ids(&["s1", "s2", "s3"]), &enrolled, &approved).is_err());
    }

    #[test]
    fn test_remove_partitions_warnings() {
        let plan = plan_remove(&ids(&["s1", "s9"]), &set(&["s1", "s2"])).unwrap();
        assert_eq!(plan.to_drop, ids(&["s1"]));
        assert_eq!(plan.not_enrolled, ids(&["s9"]));
    }

    #[test]
    fn test_remove_fails_when_nothing_enrolled() {
        assert!(plan_remove(&ids(&["s9"]), &set(&["s1"])).is_err());
    }

    #[test]
    fn test_clamp_progress() {
        assert_eq!(clamp_progress(-5), 0);
        assert_eq!(clamp_progress(50), 50);
        assert_eq!(clamp_progress(150), 100);
    }
}
