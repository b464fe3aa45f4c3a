pub mod base;
pub mod session;
pub mod user;

pub use base::{DaoError, DaoResult, PaginatedResult};
pub use session::{SessionsDao, SessionsStore, StreamsPage};
pub use user::UsersDao;
