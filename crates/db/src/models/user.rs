use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// An account as persisted in the `users` collection. `uid` is the
/// identifier asserted by the external credential-verification service;
/// `user_id` keys everything signaling-side and doubles as the session id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub uid: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime,
}

impl User {
    pub const COLLECTION: &'static str = "users";

    pub fn new(uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            user_id: uuid::Uuid::new_v4().to_string(),
            uid: uid.into(),
            name: name.into(),
            email: None,
            is_admin: false,
            created_at: DateTime::now(),
        }
    }
}
