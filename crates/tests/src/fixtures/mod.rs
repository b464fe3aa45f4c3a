pub mod harness;
pub mod memory_bus;
pub mod memory_store;
pub mod recording_transcoder;

pub use harness::TestHarness;
pub use memory_bus::MemoryBus;
pub use memory_store::MemoryStore;
pub use recording_transcoder::RecordingTranscoder;
