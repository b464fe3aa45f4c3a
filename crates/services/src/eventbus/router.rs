use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::ids::UserSessionId;

use super::bus::{BusError, RpcSubscriber, ServerMessage};
use super::rpc::{IceCandidateParams, Rpc, SdpParams};

/// Server-side reactions to the signaling methods. Implemented by the
/// sessions manager; having a trait instead of nullable callbacks makes an
/// unset handler a compile-time impossibility.
#[async_trait]
pub trait SignalingHandler: Send + Sync {
    async fn on_join(&self, user_id: UserSessionId) -> anyhow::Result<()>;
    async fn on_offer(&self, user_id: UserSessionId, params: SdpParams) -> anyhow::Result<()>;
    async fn on_add_ice_candidate(
        &self,
        user_id: UserSessionId,
        params: IceCandidateParams,
    ) -> anyhow::Result<()>;
    async fn on_close_session(&self, user_id: UserSessionId) -> anyhow::Result<()>;
    async fn on_publish_stream(&self, user_id: UserSessionId) -> anyhow::Result<()>;
    async fn on_stop_stream(&self, user_id: UserSessionId) -> anyhow::Result<()>;
    async fn on_subscribe(
        &self,
        user_id: UserSessionId,
        streamer: UserSessionId,
    ) -> anyhow::Result<()>;
    async fn on_unsubscribe(
        &self,
        user_id: UserSessionId,
        streamer: UserSessionId,
    ) -> anyhow::Result<()>;
}

/// Dispatches every message arriving on the server channel to the
/// registered handler, one at a time, preserving publish order.
pub struct Router {
    subscriber: Arc<dyn RpcSubscriber>,
    handler: Arc<dyn SignalingHandler>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Router {
    pub fn new(subscriber: Arc<dyn RpcSubscriber>, handler: Arc<dyn SignalingHandler>) -> Self {
        Self {
            subscriber,
            handler,
            shutdown: None,
            task: None,
        }
    }

    /// Subscribes to the server channel and spawns the dispatch loop. The
    /// future resolves only after the subscription handshake completed, so
    /// a caller that publishes right after `start` cannot race it.
    pub async fn start(&mut self) -> Result<(), BusError> {
        let mut subscription = self.subscriber.subscribe_server().await?;
        let handler = self.handler.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            debug!(channel = subscription.channel(), "router started");
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    payload = subscription.recv() => match payload {
                        Some(payload) => dispatch(handler.as_ref(), &payload).await,
                        None => {
                            // Fatal: the supervisor has to restart us.
                            error!("server channel subscription lost");
                            break;
                        }
                    },
                }
            }
            subscription.close();
            debug!("router stopped");
        });

        self.shutdown = Some(shutdown_tx);
        self.task = Some(task);
        Ok(())
    }

    /// Signals the loop to exit after the in-flight message and waits for
    /// the subscription to be closed.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

async fn dispatch(handler: &dyn SignalingHandler, payload: &[u8]) {
    let message: ServerMessage = match serde_json::from_slice(payload) {
        Ok(message) => message,
        Err(e) => {
            error!(%e, "dropping undecodable server message");
            return;
        }
    };

    let rpc = match Rpc::from_value(&message.rpc) {
        Ok(rpc) => rpc,
        Err(e) => {
            error!(user_id = %message.user_id, %e, "dropping invalid rpc");
            return;
        }
    };

    let user_id = message.user_id;
    let method = rpc.method();
    let log_user = user_id.clone();

    let invocation = async {
        match rpc {
            Rpc::Join => handler.on_join(user_id.clone()).await,
            Rpc::Offer(params) => handler.on_offer(user_id.clone(), params).await,
            Rpc::IceCandidate(params) => {
                handler.on_add_ice_candidate(user_id.clone(), params).await
            }
            Rpc::CloseSession => handler.on_close_session(user_id.clone()).await,
            Rpc::Publish => handler.on_publish_stream(user_id.clone()).await,
            Rpc::PublishStop => handler.on_stop_stream(user_id.clone()).await,
            Rpc::Subscribe(params) => {
                handler.on_subscribe(user_id.clone(), params.user_id).await
            }
            Rpc::SubscribeCancel(params) => {
                handler.on_unsubscribe(user_id.clone(), params.user_id).await
            }
            Rpc::Answer(_) => {
                // Server-to-client only; a browser has no business sending it.
                warn!(user_id = %user_id, "answer received on the server channel");
                Ok(())
            }
        }
    };

    // A panicking handler must not take the dispatch loop down with it.
    match AssertUnwindSafe(invocation).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(user_id = %log_user, method = method.as_str(), %e, "handler failed"),
        Err(_) => error!(user_id = %log_user, method = method.as_str(), "handler panicked"),
    }
}
