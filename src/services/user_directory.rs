//! User directory
//!
//! Resolves user ids to display info and filters users by role. Only the
//! fields the admin screens need.

use std::collections::HashMap;

use bson::{doc, oid::ObjectId};

use crate::db::schemas::{UserDoc, UserRole, USER_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::Result;

/// Resolved display info for a user
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

impl From<UserDoc> for UserInfo {
    fn from(user: UserDoc) -> Self {
        Self {
            id: user._id.map(|o| o.to_hex()).unwrap_or_default(),
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

/// Trait for user lookups - allows swapping implementations
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve a single user id
    async fn resolve(&self, user_id: &str) -> Result<Option<UserInfo>>;

    /// Resolve a batch of user ids; unknown ids are simply absent from the map
    async fn resolve_many(&self, user_ids: &[String]) -> Result<HashMap<String, UserInfo>>;

    /// List users by role
    async fn list_by_role(&self, role: UserRole) -> Result<Vec<UserInfo>>;
}

/// MongoDB-backed user directory
pub struct MongoUserDirectory {
    collection: MongoCollection<UserDoc>,
}

impl MongoUserDirectory {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let collection = mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        Ok(Self { collection })
    }
}

/// Filter that accepts either a hex ObjectId or an email address
fn user_filter(user_id: &str) -> bson::Document {
    if let Ok(oid) = ObjectId::parse_str(user_id) {
        doc! { "_id": oid }
    } else {
        doc! { "email": user_id }
    }
}

#[async_trait::async_trait]
impl UserDirectory for MongoUserDirectory {
    async fn resolve(&self, user_id: &str) -> Result<Option<UserInfo>> {
        let user = self.collection.find_one(user_filter(user_id)).await?;
        Ok(user.map(UserInfo::from))
    }

    async fn resolve_many(&self, user_ids: &[String]) -> Result<HashMap<String, UserInfo>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let oids: Vec<ObjectId> = user_ids
            .iter()
            .filter_map(|id| ObjectId::parse_str(id).ok())
            .collect();

        let users = self
            .collection
            .find_many(doc! { "_id": { "$in": oids } })
            .await?;

        Ok(users
            .into_iter()
            .map(|u| {
                let info = UserInfo::from(u);
                (info.id.clone(), info)
            })
            .collect())
    }

    async fn list_by_role(&self, role: UserRole) -> Result<Vec<UserInfo>> {
        let users = self
            .collection
            .find_many(doc! { "role": role.as_str() })
            .await?;

        Ok(users.into_iter().map(UserInfo::from).collect())
    }
}
