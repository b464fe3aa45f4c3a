pub mod settings;

pub use settings::{CodecSpec, Environment, RtcSettings, Settings};
