use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::warn;

use crate::ids::UserSessionId;

use super::bus::{
    BusError, RpcPublisher, RpcSubscriber, SERVER_CHANNEL, ServerMessage, Subscription,
    client_channel,
};
use super::rpc::Rpc;

/// How long a slow consumer may stall the forwarding task before the
/// subscription is torn down.
const SLOW_CONSUMER_GRACE: Duration = Duration::from_secs(30);

const SUBSCRIPTION_BUFFER: usize = 256;

impl From<redis::RedisError> for BusError {
    fn from(err: redis::RedisError) -> Self {
        BusError::Transport(err.to_string())
    }
}

/// Redis pub/sub adapter for the two logical bus channels. One managed
/// connection handles all publishing; every subscription gets a dedicated
/// pub/sub connection so a stalled consumer cannot block the rest.
#[derive(Clone)]
pub struct RedisBus {
    client: redis::Client,
    publish_conn: ConnectionManager,
}

impl RedisBus {
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(url).map_err(BusError::from)?;
        let publish_conn = ConnectionManager::new(client.clone()).await?;
        Ok(Self {
            client,
            publish_conn,
        })
    }

    async fn publish_raw(&self, channel: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let mut conn = self.publish_conn.clone();
        let _receivers: i64 = conn.publish(channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: String) -> Result<Subscription, BusError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        // Returns only once the backend acknowledged the subscription, so
        // nothing published afterwards can be missed.
        pubsub.subscribe(&channel).await?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let task_channel = channel.clone();
        let task = tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            while let Some(message) = messages.next().await {
                let payload = message.get_payload_bytes().to_vec();
                if tx
                    .send_timeout(payload, SLOW_CONSUMER_GRACE)
                    .await
                    .is_err()
                {
                    // Consumer gone or stuck past the grace period. Ending
                    // the task closes the stream, which the consumer sees
                    // as a fatal subscription error.
                    warn!(channel = %task_channel, "dropping stalled subscription");
                    break;
                }
            }
        });

        Ok(Subscription::new(channel, rx, task))
    }
}

#[async_trait]
impl RpcPublisher for RedisBus {
    async fn publish_client(&self, user_id: &UserSessionId, rpc: &Rpc) -> Result<(), BusError> {
        let payload = rpc.to_json()?;
        self.publish_raw(&client_channel(user_id), payload).await
    }

    async fn publish_server(&self, message: ServerMessage) -> Result<(), BusError> {
        let payload =
            serde_json::to_vec(&message).map_err(|e| BusError::Transport(e.to_string()))?;
        self.publish_raw(SERVER_CHANNEL, payload).await
    }
}

#[async_trait]
impl RpcSubscriber for RedisBus {
    async fn subscribe_client(&self, user_id: &UserSessionId) -> Result<Subscription, BusError> {
        self.subscribe(client_channel(user_id)).await
    }

    async fn subscribe_server(&self) -> Result<Subscription, BusError> {
        self.subscribe(SERVER_CHANNEL.to_owned()).await
    }
}
