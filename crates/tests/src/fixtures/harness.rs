use prometheus::Registry;
use std::sync::Arc;
use std::time::Duration;

use livecast_config::{CodecSpec, RtcSettings};
use livecast_services::rtc::{PortsAllocator, WebRtcConfig};
use livecast_services::{Metrics, SessionsManager};

use super::memory_bus::MemoryBus;
use super::memory_store::MemoryStore;
use super::recording_transcoder::RecordingTranscoder;

/// A sessions manager wired to in-memory collaborators, plus handles to
/// each so tests can assert on what the manager did.
pub struct TestHarness {
    pub manager: Arc<SessionsManager>,
    pub bus: Arc<MemoryBus>,
    pub store: Arc<MemoryStore>,
    pub transcoder: Arc<RecordingTranscoder>,
    pub metrics: Metrics,
    _streams_root: tempfile::TempDir,
}

impl TestHarness {
    pub fn new(free_ports: u16) -> Self {
        Self::with_codecs(
            free_ports,
            vec![CodecSpec {
                mime: "audio/opus".into(),
                fmtp_line: String::new(),
            }],
        )
    }

    pub fn with_codecs(free_ports: u16, codecs: Vec<CodecSpec>) -> Self {
        let bus = Arc::new(MemoryBus::new());
        let store = Arc::new(MemoryStore::new());
        let transcoder = Arc::new(RecordingTranscoder::new());
        let metrics = Metrics::new(&Registry::new()).expect("metrics registration");
        let streams_root = tempfile::tempdir().expect("temp streams root");

        let settings = RtcSettings {
            stun_servers: vec![],
            udp_port_range_start: 50000,
            udp_port_range_end: 50000 + free_ports,
            enabled_codecs: codecs,
        };
        let allocator = Arc::new(PortsAllocator::new(
            settings.udp_port_range_start,
            settings.udp_port_range_end,
        ));

        let manager = SessionsManager::new(
            WebRtcConfig::new(&settings),
            streams_root.path(),
            store.clone(),
            bus.clone(),
            transcoder.clone(),
            allocator,
            metrics.clone(),
        );

        Self {
            manager,
            bus,
            store,
            transcoder,
            metrics,
            _streams_root: streams_root,
        }
    }
}

/// Polls a condition until it holds or the timeout elapses.
pub async fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
