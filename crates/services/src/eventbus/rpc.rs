use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::io::Read;
use thiserror::Error;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use crate::ids::UserSessionId;

const JSON_RPC_VERSION: &str = "2.0";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("unknown RPC type: {0}")]
    UnknownMethod(String),
    #[error("malformed RPC: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::Malformed(err.to_string())
    }
}

/// The closed set of signaling methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Join,
    IceCandidate,
    Offer,
    Answer,
    CloseSession,
    Publish,
    PublishStop,
    Subscribe,
    SubscribeCancel,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Join => "join",
            Method::IceCandidate => "iceCandidate",
            Method::Offer => "offer",
            Method::Answer => "answer",
            Method::CloseSession => "close_session",
            Method::Publish => "publish",
            Method::PublishStop => "publishStop",
            Method::Subscribe => "subscribe",
            Method::SubscribeCancel => "subscribeCancel",
        }
    }

    fn from_str(method: &str) -> Option<Self> {
        match method {
            "join" => Some(Method::Join),
            "iceCandidate" => Some(Method::IceCandidate),
            "offer" => Some(Method::Offer),
            "answer" => Some(Method::Answer),
            "close_session" => Some(Method::CloseSession),
            "publish" => Some(Method::Publish),
            "publishStop" => Some(Method::PublishStop),
            "subscribe" => Some(Method::Subscribe),
            "subscribeCancel" => Some(Method::SubscribeCancel),
            _ => None,
        }
    }
}

/// Which of the participant's two peer connections a signaling message
/// refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalingTarget {
    Publisher,
    Receiver,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidateParams {
    #[serde(flatten)]
    pub candidate: RTCIceCandidateInit,
    pub target: SignalingTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdpParams {
    #[serde(flatten)]
    pub description: RTCSessionDescription,
    pub target: SignalingTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeParams {
    pub user_id: UserSessionId,
}

/// A decoded signaling message. Encoding always produces the JSON-RPC 2.0
/// envelope `{jsonrpc, method, params}`.
#[derive(Debug, Clone)]
pub enum Rpc {
    Join,
    IceCandidate(IceCandidateParams),
    Offer(SdpParams),
    Answer(SdpParams),
    CloseSession,
    Publish,
    PublishStop,
    Subscribe(SubscribeParams),
    SubscribeCancel(SubscribeParams),
}

impl Rpc {
    pub fn ice_candidate(candidate: RTCIceCandidateInit, target: SignalingTarget) -> Self {
        Rpc::IceCandidate(IceCandidateParams { candidate, target })
    }

    pub fn answer(description: RTCSessionDescription, target: SignalingTarget) -> Self {
        Rpc::Answer(SdpParams {
            description,
            target,
        })
    }

    pub fn subscribe(user_id: UserSessionId) -> Self {
        Rpc::Subscribe(SubscribeParams { user_id })
    }

    pub fn method(&self) -> Method {
        match self {
            Rpc::Join => Method::Join,
            Rpc::IceCandidate(_) => Method::IceCandidate,
            Rpc::Offer(_) => Method::Offer,
            Rpc::Answer(_) => Method::Answer,
            Rpc::CloseSession => Method::CloseSession,
            Rpc::Publish => Method::Publish,
            Rpc::PublishStop => Method::PublishStop,
            Rpc::Subscribe(_) => Method::Subscribe,
            Rpc::SubscribeCancel(_) => Method::SubscribeCancel,
        }
    }

    pub fn to_value(&self) -> Result<Value, RpcError> {
        let params = match self {
            Rpc::Join | Rpc::CloseSession | Rpc::Publish | Rpc::PublishStop => Value::Null,
            Rpc::IceCandidate(params) => serde_json::to_value(params)?,
            Rpc::Offer(params) | Rpc::Answer(params) => serde_json::to_value(params)?,
            Rpc::Subscribe(params) | Rpc::SubscribeCancel(params) => {
                serde_json::to_value(params)?
            }
        };

        Ok(json!({
            "jsonrpc": JSON_RPC_VERSION,
            "method": self.method().as_str(),
            "params": params,
        }))
    }

    pub fn to_json(&self) -> Result<Vec<u8>, RpcError> {
        Ok(serde_json::to_vec(&self.to_value()?)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, RpcError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, RpcError> {
        let envelope = value
            .as_object()
            .ok_or_else(|| RpcError::Malformed("envelope is not an object".into()))?;

        let version = envelope.get("jsonrpc").and_then(Value::as_str);
        if version != Some(JSON_RPC_VERSION) {
            return Err(RpcError::Malformed(format!(
                "unsupported jsonrpc version {version:?}"
            )));
        }

        let method = envelope
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::Malformed("missing method".into()))?;
        let method =
            Method::from_str(method).ok_or_else(|| RpcError::UnknownMethod(method.to_owned()))?;

        let params = envelope.get("params").cloned().unwrap_or(Value::Null);

        match method {
            Method::Join => Ok(Rpc::Join),
            Method::CloseSession => Ok(Rpc::CloseSession),
            Method::Publish => Ok(Rpc::Publish),
            Method::PublishStop => Ok(Rpc::PublishStop),
            Method::IceCandidate => Ok(Rpc::IceCandidate(serde_json::from_value(params)?)),
            Method::Offer => Ok(Rpc::Offer(decode_sdp_params(params, true)?)),
            Method::Answer => Ok(Rpc::Answer(decode_sdp_params(params, false)?)),
            Method::Subscribe => Ok(Rpc::Subscribe(serde_json::from_value(params)?)),
            Method::SubscribeCancel => Ok(Rpc::SubscribeCancel(serde_json::from_value(params)?)),
        }
    }
}

fn decode_sdp_params(params: Value, inflate: bool) -> Result<SdpParams, RpcError> {
    #[derive(Deserialize)]
    struct RawSdpParams {
        #[serde(rename = "type")]
        sdp_type: String,
        sdp: String,
        target: SignalingTarget,
    }

    let raw: RawSdpParams = serde_json::from_value(params)?;
    let sdp = if inflate {
        maybe_inflate_sdp(raw.sdp)?
    } else {
        raw.sdp
    };

    let description: RTCSessionDescription =
        serde_json::from_value(json!({ "type": raw.sdp_type, "sdp": sdp }))?;

    Ok(SdpParams {
        description,
        target: raw.target,
    })
}

/// Large offers cross the websocket gzip-compressed and base64-coded. A
/// plain SDP never survives strict base64 decoding (it contains newlines),
/// so decodability plus the gzip magic identifies the wrapped form.
fn maybe_inflate_sdp(sdp: String) -> Result<String, RpcError> {
    let Ok(decoded) = BASE64.decode(sdp.as_bytes()) else {
        return Ok(sdp);
    };
    if decoded.len() < GZIP_MAGIC.len() || decoded[..2] != GZIP_MAGIC {
        return Ok(sdp);
    }

    let mut inflated = String::new();
    GzDecoder::new(decoded.as_slice())
        .read_to_string(&mut inflated)
        .map_err(|e| RpcError::Malformed(format!("gzipped sdp: {e}")))?;
    Ok(inflated)
}
