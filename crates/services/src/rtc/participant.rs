use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, warn};
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use webrtc::track::track_remote::TrackRemote;

use crate::eventbus::{Rpc, RpcPublisher, SignalingTarget};
use crate::eventbus::rpc::{IceCandidateParams, SdpParams};
use crate::ids::UserSessionId;
use crate::telemetry::Metrics;

use super::RtcError;
use super::config::WebRtcConfig;
use super::media_engine::enabled_codecs;
use super::media_track::MediaTrack;
use super::ports::PortsAllocator;
use super::transcoder_sdp;
use super::transport::{PcTransport, TransportParams};

pub const RELIABLE_DATA_CHANNEL: &str = "_reliable";

/// Keyframe cadence forced onto the publisher while tracks are live.
const PLI_INTERVAL: Duration = Duration::from_secs(2);

/// One user's WebRTC state inside a room: the publisher peer connection,
/// the (future) subscriber connection, forwarded tracks, and the UDP ports
/// reserved for transcoder egress.
pub struct Participant {
    id: UserSessionId,
    publisher: Arc<PcTransport>,
    subscriber: Option<Arc<PcTransport>>,
    reliable_dc: Mutex<Option<Arc<RTCDataChannel>>>,
    published_tracks: Arc<Mutex<HashMap<String, Arc<MediaTrack>>>>,
    udp_ports: HashMap<u8, u16>,
    transcoder_sdp: String,
    allocator: Arc<PortsAllocator>,
    sink: Arc<dyn RpcPublisher>,
    metrics: Metrics,
    closed: watch::Sender<bool>,
}

impl Participant {
    pub async fn new(
        id: UserSessionId,
        sink: Arc<dyn RpcPublisher>,
        config: WebRtcConfig,
        allocator: Arc<PortsAllocator>,
        streams_root: &Path,
        metrics: Metrics,
    ) -> Result<Arc<Self>, RtcError> {
        let publisher = Arc::new(
            PcTransport::new(TransportParams {
                enabled_codecs: &config.enabled_codecs,
                config: &config,
                target: SignalingTarget::Publisher,
            })
            .await?,
        );

        let codecs = enabled_codecs(&config.enabled_codecs, &config.publisher);

        // One egress port per enabled codec. On exhaustion everything
        // reserved so far goes back and the fresh peer connection is torn
        // down off-task.
        let mut udp_ports = HashMap::new();
        for (params, _) in &codecs {
            match allocator.allocate() {
                Ok(port) => {
                    udp_ports.insert(params.payload_type, port);
                }
                Err(e) => {
                    for port in udp_ports.values() {
                        allocator.deallocate(*port);
                    }
                    let transport = publisher.clone();
                    tokio::spawn(async move {
                        let _ = transport.close().await;
                    });
                    return Err(e);
                }
            }
        }

        let sdp = transcoder_sdp::build(&id, &codecs, &udp_ports);
        if let Err(e) = transcoder_sdp::write(streams_root, &id, &sdp).await {
            for port in udp_ports.values() {
                allocator.deallocate(*port);
            }
            let transport = publisher.clone();
            tokio::spawn(async move {
                let _ = transport.close().await;
            });
            return Err(e.into());
        }

        let (closed, _) = watch::channel(false);
        let participant = Arc::new(Self {
            id,
            publisher,
            subscriber: None,
            reliable_dc: Mutex::new(None),
            published_tracks: Arc::new(Mutex::new(HashMap::new())),
            udp_ports,
            transcoder_sdp: sdp,
            allocator,
            sink,
            metrics,
            closed,
        });
        participant.install_publisher_handlers();

        Ok(participant)
    }

    pub fn id(&self) -> &UserSessionId {
        &self.id
    }

    /// The session description the transcoder reads to learn which
    /// loopback port serves which codec.
    pub fn transcoder_sdp(&self) -> &str {
        &self.transcoder_sdp
    }

    pub fn publisher(&self) -> &Arc<PcTransport> {
        &self.publisher
    }

    pub fn published_track_count(&self) -> usize {
        self.published_tracks.lock().len()
    }

    pub fn reliable_channel_open(&self) -> bool {
        self.reliable_dc.lock().is_some()
    }

    fn install_publisher_handlers(self: &Arc<Self>) {
        let pc = self.publisher.peer_connection();

        // Gathered candidates go straight back to the browser. The
        // callbacks only ever hold the sink and the user id, never the
        // participant itself.
        let sink = self.sink.clone();
        let id = self.id.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let sink = sink.clone();
            let id = id.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else { return };
                let init = match candidate.to_json() {
                    Ok(init) => init,
                    Err(e) => {
                        error!(user_id = %id, %e, "failed to encode ICE candidate");
                        return;
                    }
                };
                debug!(user_id = %id, candidate = %init.candidate, "send ICE candidate");
                let rpc = Rpc::ice_candidate(init, SignalingTarget::Publisher);
                if let Err(e) = sink.publish_client(&id, &rpc).await {
                    error!(user_id = %id, %e, "failed to publish ICE candidate");
                }
            })
        }));

        let weak = Arc::downgrade(self);
        let metrics = self.metrics.clone();
        let id = self.id.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let weak = weak.clone();
            let metrics = metrics.clone();
            let id = id.clone();
            Box::pin(async move {
                debug!(user_id = %id, ?state, "connection state changed");
                match state {
                    RTCPeerConnectionState::Connected => metrics.ice_connection_success(),
                    RTCPeerConnectionState::Failed => {
                        metrics.ice_connection_failed("state_failed");
                        if let Some(participant) = weak.upgrade() {
                            participant.close().await;
                        }
                    }
                    _ => {}
                }
            })
        }));

        let weak = Arc::downgrade(self);
        let id = self.id.clone();
        pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let weak = weak.clone();
            let id = id.clone();
            Box::pin(async move {
                if dc.label() != RELIABLE_DATA_CHANNEL {
                    error!(user_id = %id, label = dc.label(), "unsupported datachannel added");
                    return;
                }
                // Traffic on the reliable channel is ignored for now.
                dc.on_message(Box::new(|_| Box::pin(async {})));
                if let Some(participant) = weak.upgrade() {
                    *participant.reliable_dc.lock() = Some(dc);
                }
            })
        }));

        let tracks = self.published_tracks.clone();
        let udp_ports = self.udp_ports.clone();
        let pc_weak = Arc::downgrade(pc);
        let closed = self.closed.clone();
        let id = self.id.clone();
        pc.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
            let tracks = tracks.clone();
            let udp_ports = udp_ports.clone();
            let pc_weak = pc_weak.clone();
            let closed = closed.clone();
            let id = id.clone();
            Box::pin(async move {
                debug!(user_id = %id, track = %track.id(), "on media track");

                spawn_pli_ticker(pc_weak, track.ssrc(), closed.subscribe());

                let payload_type = track.payload_type();
                let Some(&port) = udp_ports.get(&payload_type) else {
                    warn!(
                        user_id = %id,
                        payload_type,
                        "no egress port allocated for payload type, ignoring track"
                    );
                    return;
                };

                let media_track = match MediaTrack::new(track.id(), payload_type, port).await {
                    Ok(media_track) => media_track,
                    Err(e) => {
                        error!(user_id = %id, %e, "failed to open egress socket");
                        return;
                    }
                };

                tracks.lock().insert(track.id(), media_track.clone());
                media_track.forward_rtp(track);
            })
        }));
    }

    /// Routes a candidate to the transport named by `params.target`.
    pub async fn add_ice_candidate(&self, params: IceCandidateParams) -> Result<(), RtcError> {
        debug!(user_id = %self.id, target = ?params.target, "add ICE candidate");
        match params.target {
            SignalingTarget::Publisher => self.publisher.add_ice_candidate(params.candidate).await,
            SignalingTarget::Receiver => match &self.subscriber {
                Some(subscriber) => subscriber.add_ice_candidate(params.candidate).await,
                None => Err(RtcError::ReceiverNotInitialized),
            },
        }
    }

    /// Publisher offers drive the whole negotiation: set remote (draining
    /// buffered ICE), answer, set local, push the answer to the client.
    /// A failure at any step tears the transport down.
    pub async fn handle_offer(&self, params: SdpParams) -> Result<(), RtcError> {
        debug!(user_id = %self.id, target = ?params.target, "handle offer");

        match params.target {
            SignalingTarget::Publisher => {
                if let Err(e) = self.negotiate_publisher(params).await {
                    let transport = self.publisher.clone();
                    tokio::spawn(async move {
                        let _ = transport.close().await;
                    });
                    return Err(e);
                }
                Ok(())
            }
            SignalingTarget::Receiver => {
                debug!(user_id = %self.id, "receiver offers are deferred until subscriptions allocate a transport");
                Ok(())
            }
        }
    }

    async fn negotiate_publisher(&self, params: SdpParams) -> Result<(), RtcError> {
        self.publisher.set_remote_description(params.description).await?;

        let pc = self.publisher.peer_connection();
        let answer = pc.create_answer(None).await?;
        pc.set_local_description(answer).await?;

        let local = pc
            .local_description()
            .await
            .ok_or(RtcError::LocalDescriptionMissing)?;
        let rpc = Rpc::answer(local, SignalingTarget::Publisher);
        self.sink.publish_client(&self.id, &rpc).await?;
        Ok(())
    }

    /// Stops forwarding, returns the egress ports, and closes the peer
    /// connections in the background (closing may block on candidate
    /// gathering). Safe to call more than once.
    pub async fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        debug!(user_id = %self.id, "close participant");

        let tracks: Vec<Arc<MediaTrack>> = {
            let mut map = self.published_tracks.lock();
            map.drain().map(|(_, track)| track).collect()
        };
        for track in tracks {
            track.close();
        }

        for port in self.udp_ports.values() {
            self.allocator.deallocate(*port);
        }

        let publisher = self.publisher.clone();
        let subscriber = self.subscriber.clone();
        tokio::spawn(async move {
            if let Err(e) = publisher.close().await {
                warn!(%e, "publisher transport close failed");
            }
            if let Some(subscriber) = subscriber {
                if let Err(e) = subscriber.close().await {
                    warn!(%e, "subscriber transport close failed");
                }
            }
        });
    }
}

fn spawn_pli_ticker(
    pc: Weak<RTCPeerConnection>,
    media_ssrc: u32,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PLI_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let Some(pc) = pc.upgrade() else { break };
                    let pli = PictureLossIndication {
                        sender_ssrc: 0,
                        media_ssrc,
                    };
                    if let Err(e) = pc.write_rtcp(&[Box::new(pli)]).await {
                        debug!(%e, "PLI write failed, stopping keyframe ticker");
                        break;
                    }
                }
            }
        }
    });
}
