pub mod daemon;
pub mod message;
pub mod pipeline;

pub use daemon::Daemon;
