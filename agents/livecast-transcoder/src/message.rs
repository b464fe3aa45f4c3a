use serde::{Deserialize, Serialize};

/// Subjects shared with the SFU's transcoder gateway. Start requests use a
/// queue group so exactly one worker picks each stream up; stops are
/// broadcast and every worker checks ownership.
pub const START_HLS_SUBJECT: &str = "transcoder.start.hls";
pub const HLS_QUEUE_GROUP: &str = "transcoder.hls";
pub const STOP_SUBJECT: &str = "transcoder.stop";

/// Control payload: the owning user and (for starts) the session
/// description naming the UDP ports RTP arrives on. The SDP travels
/// base64-coded inside the JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub user_id: String,
    #[serde(with = "sdp_base64")]
    pub sdp: Vec<u8>,
}

mod sdp_base64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
