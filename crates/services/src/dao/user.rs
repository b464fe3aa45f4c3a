use bson::{DateTime, doc};
use mongodb::Database;
use mongodb::options::ReturnDocument;

use livecast_db::models::User;

use super::base::{BaseDao, DaoError, DaoResult};

pub struct UsersDao {
    base: BaseDao<User>,
}

impl UsersDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, User::COLLECTION),
        }
    }

    /// Creates the account on first sight of a verified uid; later calls
    /// only refresh the display name.
    pub async fn upsert(&self, uid: &str, name: &str) -> DaoResult<User> {
        let fresh = User::new(uid, name);
        self.base
            .collection()
            .find_one_and_update(
                doc! { "uid": uid },
                doc! {
                    "$set": { "name": name },
                    "$setOnInsert": {
                        "user_id": &fresh.user_id,
                        "uid": uid,
                        "is_admin": false,
                        "created_at": DateTime::now(),
                    },
                },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn find_by_uid(&self, uid: &str) -> DaoResult<Option<User>> {
        self.base.find_one(doc! { "uid": uid }).await
    }

    pub async fn find_by_user_id(&self, user_id: &str) -> DaoResult<Option<User>> {
        self.base.find_one(doc! { "user_id": user_id }).await
    }
}
