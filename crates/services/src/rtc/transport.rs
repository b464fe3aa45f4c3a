use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use webrtc::api::APIBuilder;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use livecast_config::CodecSpec;

use super::RtcError;
use super::config::WebRtcConfig;
use super::media_engine::{build_registry, create_media_engine};
use crate::eventbus::SignalingTarget;

const DTLS_RETRANSMISSION_INTERVAL: Duration = Duration::from_millis(100);
const RECEIVE_MTU: usize = 1400;
// Disconnect timeout stretched for ice-lite Firefox clients; the other two
// are the library defaults.
const ICE_DISCONNECTED_TIMEOUT: Duration = Duration::from_secs(10);
const ICE_FAILED_TIMEOUT: Duration = Duration::from_secs(25);
const ICE_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(2);

pub struct TransportParams<'a> {
    pub enabled_codecs: &'a [CodecSpec],
    pub config: &'a WebRtcConfig,
    pub target: SignalingTarget,
}

/// One peer connection plus the ICE candidates that arrived before its
/// remote description did.
pub struct PcTransport {
    pc: Arc<RTCPeerConnection>,
    target: SignalingTarget,
    pending_candidates: Mutex<Vec<RTCIceCandidateInit>>,
}

impl PcTransport {
    pub async fn new(params: TransportParams<'_>) -> Result<Self, RtcError> {
        debug!(target = ?params.target, "create new peer connection");

        let direction = match params.target {
            SignalingTarget::Publisher => &params.config.publisher,
            SignalingTarget::Receiver => &params.config.receiver,
        };

        let mut media_engine = create_media_engine(params.enabled_codecs, direction)?;
        let registry = build_registry(&mut media_engine, params.target)?;

        let mut setting_engine = SettingEngine::default();
        // Trusted path between browser and SFU; replay protection only
        // costs cycles here.
        setting_engine.disable_srtp_replay_protection(true);
        setting_engine.disable_srtcp_replay_protection(true);
        setting_engine.set_receive_mtu(RECEIVE_MTU);
        setting_engine.set_ice_timeouts(
            Some(ICE_DISCONNECTED_TIMEOUT),
            Some(ICE_FAILED_TIMEOUT),
            Some(ICE_KEEPALIVE_INTERVAL),
        );
        setting_engine.set_dtls_retransmission_interval(DTLS_RETRANSMISSION_INTERVAL);

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .with_setting_engine(setting_engine)
            .build();

        let pc = Arc::new(
            api.new_peer_connection(params.config.configuration.clone())
                .await?,
        );

        Ok(Self {
            pc,
            target: params.target,
            pending_candidates: Mutex::new(Vec::new()),
        })
    }

    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.pc
    }

    pub fn target(&self) -> SignalingTarget {
        self.target
    }

    /// Applies the candidate right away when the remote description is
    /// already set; buffers it otherwise. The lock is held across the
    /// apply so buffered and direct candidates cannot interleave with a
    /// concurrent drain.
    pub async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<(), RtcError> {
        let mut pending = self.pending_candidates.lock().await;
        if self.pc.remote_description().await.is_some() {
            self.pc.add_ice_candidate(candidate).await?;
        } else {
            pending.push(candidate);
        }
        Ok(())
    }

    /// Sets the remote description, then drains every buffered candidate
    /// in insertion order. The pending list is empty afterwards.
    pub async fn set_remote_description(
        &self,
        description: RTCSessionDescription,
    ) -> Result<(), RtcError> {
        let mut pending = self.pending_candidates.lock().await;
        self.pc.set_remote_description(description).await?;

        for candidate in pending.drain(..) {
            self.pc.add_ice_candidate(candidate).await?;
        }
        Ok(())
    }

    pub async fn pending_candidate_count(&self) -> usize {
        self.pending_candidates.lock().await.len()
    }

    pub async fn close(&self) -> Result<(), RtcError> {
        self.pc.close().await?;
        Ok(())
    }
}
