use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;

use livecast_services::UserSessionId;
use livecast_services::eventbus::bus::{
    BusError, RpcPublisher, RpcSubscriber, SERVER_CHANNEL, ServerMessage, Subscription,
    client_channel,
};
use livecast_services::eventbus::rpc::Rpc;

/// In-process event bus standing in for Redis: per-channel fan-out with
/// publish-order delivery, plus a log of every client-channel RPC so tests
/// can assert on what the server sent to each user.
#[derive(Default)]
pub struct MemoryBus {
    subscribers: Mutex<HashMap<String, Vec<mpsc::Sender<Vec<u8>>>>>,
    client_log: Mutex<Vec<(UserSessionId, serde_json::Value)>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every RPC published to `client:<user>` so far, in publish order.
    pub fn client_messages(&self, user_id: &UserSessionId) -> Vec<serde_json::Value> {
        self.client_log
            .lock()
            .iter()
            .filter(|(id, _)| id == user_id)
            .map(|(_, value)| value.clone())
            .collect()
    }

    /// Methods of the client-channel RPCs sent to a user, in order.
    pub fn client_methods(&self, user_id: &UserSessionId) -> Vec<String> {
        self.client_messages(user_id)
            .iter()
            .filter_map(|value| value["method"].as_str().map(str::to_owned))
            .collect()
    }

    fn deliver(&self, channel: &str, payload: Vec<u8>) {
        let subscribers = self.subscribers.lock();
        if let Some(senders) = subscribers.get(channel) {
            for sender in senders {
                let _ = sender.try_send(payload.clone());
            }
        }
    }

    fn register(&self, channel: String) -> Subscription {
        let (tx, rx) = mpsc::channel(256);
        self.subscribers
            .lock()
            .entry(channel.clone())
            .or_default()
            .push(tx);
        // The forwarding work happens inline in `deliver`; the task slot
        // only exists so `close` has something to abort.
        let task = tokio::spawn(std::future::pending());
        Subscription::new(channel, rx, task)
    }
}

#[async_trait]
impl RpcPublisher for MemoryBus {
    async fn publish_client(&self, user_id: &UserSessionId, rpc: &Rpc) -> Result<(), BusError> {
        let value = rpc.to_value()?;
        self.client_log.lock().push((user_id.clone(), value));
        self.deliver(&client_channel(user_id), rpc.to_json()?);
        Ok(())
    }

    async fn publish_server(&self, message: ServerMessage) -> Result<(), BusError> {
        let payload =
            serde_json::to_vec(&message).map_err(|e| BusError::Transport(e.to_string()))?;
        self.deliver(SERVER_CHANNEL, payload);
        Ok(())
    }
}

#[async_trait]
impl RpcSubscriber for MemoryBus {
    async fn subscribe_client(&self, user_id: &UserSessionId) -> Result<Subscription, BusError> {
        Ok(self.register(client_channel(user_id)))
    }

    async fn subscribe_server(&self) -> Result<Subscription, BusError> {
        Ok(self.register(SERVER_CHANNEL.to_owned()))
    }
}
