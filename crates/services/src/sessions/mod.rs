mod manager;

pub use manager::{SessionError, SessionsManager};
