use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use livecast_db::models::Session;
use livecast_services::dao::base::DaoResult;
use livecast_services::dao::session::{SessionsStore, StreamsPage};

/// Recording in-memory stand-in for the sessions repository. Keeps one row
/// per user (the production unique index) and logs every operation.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<String, Session>>,
    operations: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().clone()
    }

    pub fn operation_count(&self, name: &str) -> usize {
        let prefix = format!("{name}:");
        self.operations
            .lock()
            .iter()
            .filter(|op| op.starts_with(&prefix))
            .count()
    }

    pub fn session(&self, user_id: &str) -> Option<Session> {
        self.rows.lock().get(user_id).cloned()
    }

    fn record(&self, name: &str, user_id: &str) {
        self.operations.lock().push(format!("{name}:{user_id}"));
    }
}

#[async_trait]
impl SessionsStore for MemoryStore {
    async fn save(&self, session: &Session) -> DaoResult<Session> {
        self.record("save", &session.user_id);

        let mut rows = self.rows.lock();
        let stored = rows
            .entry(session.user_id.clone())
            .and_modify(|row| {
                row.title = session.title.clone();
                row.image_filename = session.image_filename.clone();
                row.is_online = true;
            })
            .or_insert_with(|| {
                let mut row = session.clone();
                row.id = Some(bson::oid::ObjectId::new());
                row.is_online = true;
                row
            });
        Ok(stored.clone())
    }

    async fn set_online(&self, user_id: &str) -> DaoResult<()> {
        self.record("set_online", user_id);
        if let Some(row) = self.rows.lock().get_mut(user_id) {
            row.is_online = true;
        }
        Ok(())
    }

    async fn set_offline(&self, user_id: &str) -> DaoResult<()> {
        self.record("set_offline", user_id);
        if let Some(row) = self.rows.lock().get_mut(user_id) {
            row.is_online = false;
        }
        Ok(())
    }

    async fn start_publish(&self, user_id: &str) -> DaoResult<()> {
        self.record("start_publish", user_id);
        Ok(())
    }

    async fn stop_publish(&self, user_id: &str) -> DaoResult<()> {
        self.record("stop_publish", user_id);
        Ok(())
    }

    async fn find_by_user_id(&self, user_id: &str) -> DaoResult<Option<Session>> {
        Ok(self.rows.lock().get(user_id).cloned())
    }

    async fn get_all(&self, _page: u64, _per_page: u64) -> DaoResult<StreamsPage> {
        let streams: Vec<Session> = self.rows.lock().values().cloned().collect();
        Ok(StreamsPage {
            streams,
            total_pages: 1,
        })
    }
}
