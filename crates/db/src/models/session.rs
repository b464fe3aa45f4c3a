use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// A user's streaming session as persisted in the `sessions` collection.
///
/// At most one document exists per `user_id` (unique index); the sessions
/// manager upserts it on every `join` and flips the state/online flags as
/// the stream moves through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_filename: Option<String>,
    #[serde(default)]
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(default)]
    pub viewers_count: i64,
    #[serde(default)]
    pub is_online: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    PublishingSingle,
    PublishingMulti,
    Viewing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Video,
    Audio,
}

impl Session {
    pub const COLLECTION: &'static str = "sessions";

    /// A fresh idle session document for a user who just joined.
    pub fn new_idle(user_id: impl Into<String>) -> Self {
        let now = DateTime::now();
        Self {
            id: None,
            user_id: user_id.into(),
            title: String::new(),
            image_filename: None,
            state: SessionState::Idle,
            media_type: None,
            viewers_count: 0,
            is_online: true,
            created_at: now,
            updated_at: now,
        }
    }
}
