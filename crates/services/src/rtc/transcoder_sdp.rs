use std::collections::HashMap;
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecParameters, RTPCodecType};

use crate::ids::UserSessionId;

pub const TRANSCODER_SDP_FILENAME: &str = "transcoder.sdp";

/// Renders the session description the transcoder consumes: one media
/// section per enabled codec, each bound to the loopback port reserved for
/// that payload type.
pub fn build(
    user_id: &UserSessionId,
    codecs: &[(RTCRtpCodecParameters, RTPCodecType)],
    ports: &HashMap<u8, u16>,
) -> String {
    let mut sdp = String::new();
    let _ = writeln!(sdp, "v=0");
    let _ = writeln!(sdp, "o=- 0 0 IN IP4 127.0.0.1");
    let _ = writeln!(sdp, "s={user_id}");
    let _ = writeln!(sdp, "c=IN IP4 127.0.0.1");
    let _ = writeln!(sdp, "t=0 0");

    for (params, codec_type) in codecs {
        let Some(port) = ports.get(&params.payload_type) else {
            continue;
        };
        let media = match codec_type {
            RTPCodecType::Audio => "audio",
            _ => "video",
        };
        let _ = writeln!(sdp, "m={media} {port} RTP/AVP {}", params.payload_type);
        let _ = writeln!(
            sdp,
            "a=rtpmap:{} {}",
            params.payload_type,
            rtpmap_encoding(&params.capability.mime_type, params.capability.clock_rate, params.capability.channels),
        );
        if !params.capability.sdp_fmtp_line.is_empty() {
            let _ = writeln!(
                sdp,
                "a=fmtp:{} {}",
                params.payload_type, params.capability.sdp_fmtp_line
            );
        }
    }

    sdp
}

fn rtpmap_encoding(mime_type: &str, clock_rate: u32, channels: u16) -> String {
    let name = mime_type
        .rsplit_once('/')
        .map(|(_, name)| name)
        .unwrap_or(mime_type);
    if channels > 0 {
        format!("{name}/{clock_rate}/{channels}")
    } else {
        format!("{name}/{clock_rate}")
    }
}

/// Writes the document to `<streams_root>/<user-id>/transcoder.sdp`,
/// creating the stream directory if needed.
pub async fn write(
    streams_root: &Path,
    user_id: &UserSessionId,
    sdp: &str,
) -> io::Result<PathBuf> {
    let dir = streams_root.join(user_id.as_str());
    tokio::fs::create_dir_all(&dir).await?;

    let path = dir.join(TRANSCODER_SDP_FILENAME);
    tokio::fs::write(&path, sdp).await?;
    Ok(path)
}
