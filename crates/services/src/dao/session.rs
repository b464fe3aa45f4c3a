use async_trait::async_trait;
use bson::{DateTime, doc};
use mongodb::Database;
use mongodb::options::ReturnDocument;
use serde::Serialize;

use livecast_db::models::Session;

use super::base::{BaseDao, DaoError, DaoResult};

const PAGE_DEFAULT: u64 = 1;
const PER_PAGE_DEFAULT: u64 = 50;

/// One page of publicly listed streams.
#[derive(Debug, Clone, Serialize)]
pub struct StreamsPage {
    pub streams: Vec<Session>,
    pub total_pages: u64,
}

/// Durable session state, as the sessions manager sees it. The MongoDB
/// implementation below is the production one; tests substitute their own.
#[async_trait]
pub trait SessionsStore: Send + Sync {
    /// Upserts the per-user session row, flipping it online. Returns the
    /// stored document.
    async fn save(&self, session: &Session) -> DaoResult<Session>;
    async fn set_online(&self, user_id: &str) -> DaoResult<()>;
    async fn set_offline(&self, user_id: &str) -> DaoResult<()>;
    async fn start_publish(&self, user_id: &str) -> DaoResult<()>;
    async fn stop_publish(&self, user_id: &str) -> DaoResult<()>;
    async fn find_by_user_id(&self, user_id: &str) -> DaoResult<Option<Session>>;
    async fn get_all(&self, page: u64, per_page: u64) -> DaoResult<StreamsPage>;
}

pub struct SessionsDao {
    base: BaseDao<Session>,
}

impl SessionsDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Session::COLLECTION),
        }
    }

    /// Updates the user's stream card (title + cover image) without
    /// touching the lifecycle fields.
    pub async fn update_stream_info(
        &self,
        user_id: &str,
        title: &str,
        image_filename: Option<&str>,
    ) -> DaoResult<bool> {
        self.base
            .update_one(
                doc! { "user_id": user_id },
                doc! {
                    "$set": {
                        "title": title,
                        "image_filename": image_filename,
                        "updated_at": DateTime::now(),
                    }
                },
            )
            .await
    }
}

#[async_trait]
impl SessionsStore for SessionsDao {
    async fn save(&self, session: &Session) -> DaoResult<Session> {
        let now = DateTime::now();
        self.base
            .collection()
            .find_one_and_update(
                doc! { "user_id": &session.user_id },
                doc! {
                    "$set": {
                        "title": &session.title,
                        "image_filename": session.image_filename.as_deref(),
                        "is_online": true,
                        "updated_at": now,
                    },
                    "$setOnInsert": {
                        "user_id": &session.user_id,
                        "state": "idle",
                        "viewers_count": 0i64,
                        "created_at": now,
                    },
                },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or(DaoError::NotFound)
    }

    async fn set_online(&self, user_id: &str) -> DaoResult<()> {
        self.base
            .update_one(
                doc! { "user_id": user_id },
                doc! { "$set": { "is_online": true, "updated_at": DateTime::now() } },
            )
            .await?;
        Ok(())
    }

    async fn set_offline(&self, user_id: &str) -> DaoResult<()> {
        self.base
            .update_one(
                doc! { "user_id": user_id },
                doc! {
                    "$set": {
                        "is_online": false,
                        "state": "idle",
                        "media_type": null,
                        "updated_at": DateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn start_publish(&self, user_id: &str) -> DaoResult<()> {
        self.base
            .update_one(
                doc! { "user_id": user_id },
                doc! {
                    "$set": {
                        "state": "publishing_single",
                        "media_type": "video",
                        "updated_at": DateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn stop_publish(&self, user_id: &str) -> DaoResult<()> {
        self.base
            .update_one(
                doc! { "user_id": user_id },
                doc! {
                    "$set": {
                        "state": "idle",
                        "media_type": null,
                        "updated_at": DateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }

    async fn find_by_user_id(&self, user_id: &str) -> DaoResult<Option<Session>> {
        self.base.find_one(doc! { "user_id": user_id }).await
    }

    async fn get_all(&self, page: u64, per_page: u64) -> DaoResult<StreamsPage> {
        let page = if page == 0 { PAGE_DEFAULT } else { page };
        let per_page = if per_page == 0 {
            PER_PAGE_DEFAULT
        } else {
            per_page
        };

        let result = self
            .base
            .find_paginated(
                doc! { "state": "publishing_single", "is_online": true },
                doc! { "updated_at": -1 },
                page,
                per_page,
            )
            .await?;

        Ok(StreamsPage {
            streams: result.items,
            total_pages: result.total_pages,
        })
    }
}
