use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::ids::UserSessionId;

/// Subject a stream start request is published to. Workers join the
/// `transcoder.hls` queue group so exactly one of them picks it up.
pub const START_HLS_SUBJECT: &str = "transcoder.start.hls";
pub const HLS_QUEUE_GROUP: &str = "transcoder.hls";

/// Stop requests are broadcast; every worker checks whether it owns the
/// stream in question.
pub const STOP_SUBJECT: &str = "transcoder.stop";

/// Control message for the transcoder workers. The SDP travels base64-coded
/// inside the JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeMessage {
    pub user_id: UserSessionId,
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

#[derive(Debug, Error)]
#[error("transcoder gateway: {0}")]
pub struct TranscodeError(pub String);

/// Control surface of the external transcoder daemon.
#[async_trait]
pub trait TranscodeControl: Send + Sync {
    async fn start_hls(&self, user_id: &UserSessionId, sdp: Vec<u8>) -> Result<(), TranscodeError>;
    async fn stop(&self, user_id: &UserSessionId) -> Result<(), TranscodeError>;
}

/// NATS-backed implementation publishing to the transcoder subjects.
pub struct NatsTranscoder {
    client: async_nats::Client,
}

impl NatsTranscoder {
    pub async fn connect(addr: &str) -> Result<Self, TranscodeError> {
        let client = async_nats::connect(addr)
            .await
            .map_err(|e| TranscodeError(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }

    async fn publish(&self, subject: &'static str, message: &TranscodeMessage) -> Result<(), TranscodeError> {
        let payload = serde_json::to_vec(message).map_err(|e| TranscodeError(e.to_string()))?;
        self.client
            .publish(subject, payload.into())
            .await
            .map_err(|e| TranscodeError(e.to_string()))?;
        debug!(subject, user_id = %message.user_id, "transcoder message published");
        Ok(())
    }
}

#[async_trait]
impl TranscodeControl for NatsTranscoder {
    async fn start_hls(&self, user_id: &UserSessionId, sdp: Vec<u8>) -> Result<(), TranscodeError> {
        let message = TranscodeMessage {
            user_id: user_id.clone(),
            sdp,
        };
        self.publish(START_HLS_SUBJECT, &message).await
    }

    async fn stop(&self, user_id: &UserSessionId) -> Result<(), TranscodeError> {
        let message = TranscodeMessage {
            user_id: user_id.clone(),
            sdp: Vec::new(),
        };
        self.publish(STOP_SUBJECT, &message).await
    }
}
