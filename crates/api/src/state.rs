use mongodb::Database;
use prometheus::Registry;
use std::sync::Arc;

use livecast_config::Settings;
use livecast_services::dao::{SessionsDao, UsersDao};
use livecast_services::eventbus::RedisBus;
use livecast_services::Metrics;

use crate::auth::AuthClient;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Settings,
    pub sessions: Arc<SessionsDao>,
    pub users: Arc<UsersDao>,
    pub bus: Arc<RedisBus>,
    pub auth: Arc<AuthClient>,
    pub metrics: Metrics,
    pub registry: Registry,
}

impl AppState {
    pub fn new(
        db: Database,
        settings: Settings,
        bus: Arc<RedisBus>,
        metrics: Metrics,
        registry: Registry,
    ) -> Self {
        let sessions = Arc::new(SessionsDao::new(&db));
        let users = Arc::new(UsersDao::new(&db));
        let auth = Arc::new(AuthClient::new(settings.firebase_auth_service.addr.clone()));

        Self {
            db,
            settings,
            sessions,
            users,
            bus,
            auth,
            metrics,
            registry,
        }
    }
}
