use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ids::UserSessionId;

use super::rpc::{Rpc, RpcError};

/// Fan-in topic carrying browser-to-server RPCs for every user.
pub const SERVER_CHANNEL: &str = "server";

/// Per-user topic carrying server-to-browser RPCs.
pub fn client_channel(user_id: &UserSessionId) -> String {
    format!("client:{user_id}")
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("event bus transport error: {0}")]
    Transport(String),
    #[error("event bus encode error: {0}")]
    Encode(#[from] RpcError),
}

/// Envelope placed on the server channel so the single fan-in subscriber
/// can demultiplex by user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerMessage {
    pub user_id: UserSessionId,
    pub rpc: serde_json::Value,
}

impl ServerMessage {
    pub fn new(user_id: UserSessionId, rpc: &Rpc) -> Result<Self, RpcError> {
        Ok(Self {
            user_id,
            rpc: rpc.to_value()?,
        })
    }

    /// Wraps an already-encoded RPC frame, e.g. one read off a websocket.
    pub fn from_raw(user_id: UserSessionId, rpc: serde_json::Value) -> Self {
        Self { user_id, rpc }
    }
}

#[async_trait]
pub trait RpcPublisher: Send + Sync {
    async fn publish_client(&self, user_id: &UserSessionId, rpc: &Rpc) -> Result<(), BusError>;
    async fn publish_server(&self, message: ServerMessage) -> Result<(), BusError>;
}

#[async_trait]
pub trait RpcSubscriber: Send + Sync {
    async fn subscribe_client(&self, user_id: &UserSessionId) -> Result<Subscription, BusError>;
    async fn subscribe_server(&self) -> Result<Subscription, BusError>;
}

/// Consumer side of a channel subscription. `recv` yields raw message
/// payloads in publish order; `None` means the subscription is gone, which
/// a consumer must treat as fatal and resubscribe.
pub struct Subscription {
    channel: String,
    rx: mpsc::Receiver<Vec<u8>>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn new(channel: String, rx: mpsc::Receiver<Vec<u8>>, task: JoinHandle<()>) -> Self {
        Self { channel, rx, task }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    pub fn close(self) {
        self.task.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
