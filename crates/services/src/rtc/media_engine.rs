use livecast_config::CodecSpec;
use webrtc::api::interceptor_registry::{configure_twcc, register_default_interceptors};
use webrtc::api::media_engine::{
    MIME_TYPE_AV1, MIME_TYPE_H264, MIME_TYPE_OPUS, MIME_TYPE_VP8, MIME_TYPE_VP9, MediaEngine,
};
use webrtc::interceptor::registry::Registry;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTCRtpHeaderExtensionCapability, RTPCodecType,
};

use super::config::DirectionConfig;
use crate::eventbus::SignalingTarget;

/// Every codec the SFU can negotiate, with its canonical payload type.
/// The configured enable-set filters this table.
fn supported_codecs(direction: &DirectionConfig) -> Vec<(RTCRtpCodecParameters, RTPCodecType)> {
    let video_feedback = direction.video_rtcp_feedback.clone();
    let audio_feedback = direction.audio_rtcp_feedback.clone();

    vec![
        (
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    clock_rate: 48000,
                    channels: 1,
                    sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
                    rtcp_feedback: audio_feedback,
                },
                payload_type: 111,
                ..Default::default()
            },
            RTPCodecType::Audio,
        ),
        (
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP8.to_owned(),
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line: String::new(),
                    rtcp_feedback: video_feedback.clone(),
                },
                payload_type: 96,
                ..Default::default()
            },
            RTPCodecType::Video,
        ),
        (
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP9.to_owned(),
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line: "profile-id=0".to_owned(),
                    rtcp_feedback: video_feedback.clone(),
                },
                payload_type: 98,
                ..Default::default()
            },
            RTPCodecType::Video,
        ),
        (
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP9.to_owned(),
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line: "profile-id=1".to_owned(),
                    rtcp_feedback: video_feedback.clone(),
                },
                payload_type: 100,
                ..Default::default()
            },
            RTPCodecType::Video,
        ),
        (
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_H264.to_owned(),
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line:
                        "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f"
                            .to_owned(),
                    rtcp_feedback: video_feedback.clone(),
                },
                payload_type: 125,
                ..Default::default()
            },
            RTPCodecType::Video,
        ),
        (
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_H264.to_owned(),
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line:
                        "level-asymmetry-allowed=1;packetization-mode=0;profile-level-id=42e01f"
                            .to_owned(),
                    rtcp_feedback: video_feedback.clone(),
                },
                payload_type: 108,
                ..Default::default()
            },
            RTPCodecType::Video,
        ),
        (
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_H264.to_owned(),
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line:
                        "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=640032"
                            .to_owned(),
                    rtcp_feedback: video_feedback.clone(),
                },
                payload_type: 123,
                ..Default::default()
            },
            RTPCodecType::Video,
        ),
        (
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_AV1.to_owned(),
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line: String::new(),
                    rtcp_feedback: video_feedback,
                },
                payload_type: 35,
                ..Default::default()
            },
            RTPCodecType::Video,
        ),
    ]
}

fn is_codec_enabled(enabled: &[CodecSpec], capability: &RTCRtpCodecCapability) -> bool {
    enabled.iter().any(|spec| {
        spec.mime.eq_ignore_ascii_case(&capability.mime_type)
            && (spec.fmtp_line.is_empty()
                || spec.fmtp_line.eq_ignore_ascii_case(&capability.sdp_fmtp_line))
    })
}

/// The codecs from the support table selected by the enable-set, in
/// registration order. The participant derives its transcoder egress ports
/// from this list.
pub fn enabled_codecs(
    enabled: &[CodecSpec],
    direction: &DirectionConfig,
) -> Vec<(RTCRtpCodecParameters, RTPCodecType)> {
    supported_codecs(direction)
        .into_iter()
        .filter(|(params, _)| is_codec_enabled(enabled, &params.capability))
        .collect()
}

pub fn create_media_engine(
    enabled: &[CodecSpec],
    direction: &DirectionConfig,
) -> Result<MediaEngine, webrtc::Error> {
    let mut media_engine = MediaEngine::default();

    for (params, codec_type) in enabled_codecs(enabled, direction) {
        media_engine.register_codec(params, codec_type)?;
    }

    for uri in &direction.video_header_extensions {
        media_engine.register_header_extension(
            RTCRtpHeaderExtensionCapability { uri: uri.clone() },
            RTPCodecType::Video,
            None,
        )?;
    }
    for uri in &direction.audio_header_extensions {
        media_engine.register_header_extension(
            RTCRtpHeaderExtensionCapability { uri: uri.clone() },
            RTPCodecType::Audio,
            None,
        )?;
    }

    Ok(media_engine)
}

/// Interceptor chain per role: both get the defaults (NACK, RTCP reports);
/// the receiver additionally carries TWCC feedback for its bandwidth
/// estimator.
pub fn build_registry(
    media_engine: &mut MediaEngine,
    target: SignalingTarget,
) -> Result<Registry, webrtc::Error> {
    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, media_engine)?;
    if target == SignalingTarget::Receiver {
        registry = configure_twcc(registry, media_engine)?;
    }
    Ok(registry)
}
