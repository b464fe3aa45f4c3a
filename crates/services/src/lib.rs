pub mod dao;
pub mod eventbus;
pub mod ids;
pub mod rtc;
pub mod sessions;
pub mod telemetry;
pub mod transcoder;

pub use ids::UserSessionId;
pub use sessions::{SessionError, SessionsManager};
pub use telemetry::Metrics;
