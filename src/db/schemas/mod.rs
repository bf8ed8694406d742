//! Database schemas for mission-control
//!
//! Defines MongoDB document structures for the consistency layer:
//! missions, student enrollments, mentorship groups, mentor assignments,
//! batch memberships, and users.

mod batch_member;
mod mentorship_group;
mod metadata;
mod mission;
mod mission_mentor;
mod student_mission;
mod user;

pub use batch_member::{BatchMemberDoc, BatchMemberStatus, BATCH_MEMBER_COLLECTION};
pub use mentorship_group::{GroupStatus, MentorshipGroupDoc, GROUP_COLLECTION};
pub use metadata::Metadata;
pub use mission::{
    validate_course_weights, EmbeddedStudent, MissionCourse, MissionDoc, MissionStatus,
    MISSION_COLLECTION,
};
pub use mission_mentor::{MentorRole, MentorStatus, MissionMentorDoc, MISSION_MENTOR_COLLECTION};
pub use student_mission::{
    CourseProgress, EnrollmentStatus, StudentMissionDoc, STUDENT_MISSION_COLLECTION,
};
pub use user::{UserDoc, UserRole, USER_COLLECTION};
