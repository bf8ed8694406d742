//! Mentorship group membership management

mod manager;

pub use manager::{
    plan_add_students, AddMembers, CreateGroup, GroupManager, GroupPatch,
};
