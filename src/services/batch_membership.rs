//! Batch membership store
//!
//! Answers "is student X an approved member of batch Y". Enrollment and the
//! `fix` reconciliation job both gate on this.

use std::collections::HashSet;

use bson::doc;

use crate::db::schemas::{BatchMemberDoc, BATCH_MEMBER_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::Result;

/// Trait for batch membership queries - allows swapping implementations
#[async_trait::async_trait]
pub trait BatchMembership: Send + Sync {
    /// Whether the student has an approved membership in the batch
    async fn is_approved(&self, batch_id: &str, student_id: &str) -> Result<bool>;

    /// All student ids with approved membership in the batch
    async fn approved_members(&self, batch_id: &str) -> Result<HashSet<String>>;
}

/// MongoDB-backed batch membership store
pub struct MongoBatchMembership {
    collection: MongoCollection<BatchMemberDoc>,
}

impl MongoBatchMembership {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let collection = mongo
            .collection::<BatchMemberDoc>(BATCH_MEMBER_COLLECTION)
            .await?;
        Ok(Self { collection })
    }
}

#[async_trait::async_trait]
impl BatchMembership for MongoBatchMembership {
    async fn is_approved(&self, batch_id: &str, student_id: &str) -> Result<bool> {
        let found = self
            .collection
            .find_one(doc! {
                "batch_id": batch_id,
                "student_id": student_id,
                "status": "approved",
            })
            .await?;

        Ok(found.is_some())
    }

    async fn approved_members(&self, batch_id: &str) -> Result<HashSet<String>> {
        let members = self
            .collection
            .find_many(doc! { "batch_id": batch_id, "status": "approved" })
            .await?;

        Ok(members.into_iter().map(|m| m.student_id).collect())
    }
}
