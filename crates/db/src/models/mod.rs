mod session;
mod user;

pub use session::{MediaType, Session, SessionState};
pub use user::User;
