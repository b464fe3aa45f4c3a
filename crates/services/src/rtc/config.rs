use livecast_config::{CodecSpec, RtcSettings};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::rtp_transceiver::RTCPFeedback;

const FRAME_MARKING_URI: &str = "urn:ietf:params:rtp-hdrext:framemarking";
const SDES_MID_URI: &str = "urn:ietf:params:rtp-hdrext:sdes:mid";
const SDES_RTP_STREAM_ID_URI: &str = "urn:ietf:params:rtp-hdrext:sdes:rtp-stream-id";
const AUDIO_LEVEL_URI: &str = "urn:ietf:params:rtp-hdrext:ssrc-audio-level";
const TRANSPORT_CC_URI: &str =
    "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01";
const ABS_SEND_TIME_URI: &str = "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time";

/// RTP header extensions and RTCP feedback for one transport direction.
#[derive(Debug, Clone, Default)]
pub struct DirectionConfig {
    pub audio_header_extensions: Vec<String>,
    pub video_header_extensions: Vec<String>,
    pub audio_rtcp_feedback: Vec<RTCPFeedback>,
    pub video_rtcp_feedback: Vec<RTCPFeedback>,
}

/// Per-participant WebRTC configuration. Every participant gets its own
/// clone so transport-level tweaks never leak across users.
#[derive(Clone)]
pub struct WebRtcConfig {
    pub configuration: RTCConfiguration,
    pub publisher: DirectionConfig,
    pub receiver: DirectionConfig,
    pub enabled_codecs: Vec<CodecSpec>,
    pub use_send_side_bwe: bool,
}

impl std::fmt::Debug for WebRtcConfig {
    // RTCConfiguration doesn't implement Debug, so it's omitted here.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebRtcConfig")
            .field("publisher", &self.publisher)
            .field("receiver", &self.receiver)
            .field("enabled_codecs", &self.enabled_codecs)
            .field("use_send_side_bwe", &self.use_send_side_bwe)
            .finish()
    }
}

impl WebRtcConfig {
    pub fn new(settings: &RtcSettings) -> Self {
        let configuration = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: settings.stun_servers.clone(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let publisher = DirectionConfig {
            audio_header_extensions: vec![
                SDES_MID_URI.to_owned(),
                SDES_RTP_STREAM_ID_URI.to_owned(),
                AUDIO_LEVEL_URI.to_owned(),
            ],
            video_header_extensions: vec![
                SDES_MID_URI.to_owned(),
                SDES_RTP_STREAM_ID_URI.to_owned(),
                TRANSPORT_CC_URI.to_owned(),
                FRAME_MARKING_URI.to_owned(),
            ],
            audio_rtcp_feedback: Vec::new(),
            video_rtcp_feedback: vec![
                feedback("goog-remb", ""),
                feedback("transport-cc", ""),
                feedback("ccm", "fir"),
                feedback("nack", ""),
                feedback("nack", "pli"),
            ],
        };

        // The receiver side runs delay-based bandwidth estimation by
        // default; send-side BWE swaps abs-send-time/REMB for TWCC.
        let use_send_side_bwe = false;
        let mut receiver = DirectionConfig {
            audio_header_extensions: Vec::new(),
            video_header_extensions: Vec::new(),
            audio_rtcp_feedback: Vec::new(),
            video_rtcp_feedback: vec![
                feedback("ccm", "fir"),
                feedback("nack", ""),
                feedback("nack", "pli"),
            ],
        };
        if use_send_side_bwe {
            receiver
                .video_header_extensions
                .push(TRANSPORT_CC_URI.to_owned());
            receiver.video_rtcp_feedback.push(feedback("transport-cc", ""));
        } else {
            receiver
                .video_header_extensions
                .push(ABS_SEND_TIME_URI.to_owned());
            receiver.video_rtcp_feedback.push(feedback("goog-remb", ""));
        }

        Self {
            configuration,
            publisher,
            receiver,
            enabled_codecs: settings.enabled_codecs.clone(),
            use_send_side_bwe,
        }
    }
}

fn feedback(typ: &str, parameter: &str) -> RTCPFeedback {
    RTCPFeedback {
        typ: typ.to_owned(),
        parameter: parameter.to_owned(),
    }
}
