use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use livecast_services::UserSessionId;
use livecast_services::eventbus::bus::{BusError, RpcPublisher, RpcSubscriber, ServerMessage, Subscription};
use livecast_services::eventbus::rpc::Rpc;

use crate::state::AppState;

/// Signaling frames are small except for SDPs, which are capped here even
/// in their compressed form.
const MAX_MESSAGE_SIZE: usize = 200 * 1024;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    // Verify the credential before accepting the socket.
    let identity = match state.auth.verify(&params.token).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!(%e, "rejecting websocket: verification failed");
            return Response::builder()
                .status(401)
                .body("Unauthorized".into())
                .unwrap_or_default();
        }
    };

    let user = match state.users.find_by_uid(&identity.uid).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return Response::builder()
                .status(401)
                .body("Unknown user".into())
                .unwrap_or_default();
        }
        Err(e) => {
            error!(%e, "user lookup failed");
            return Response::builder()
                .status(500)
                .body("Internal error".into())
                .unwrap_or_default();
        }
    };
    let user_id = UserSessionId::from(user.user_id);

    // Subscribe before the upgrade completes; the handshake is synchronous,
    // so nothing published after this point can be missed.
    let subscription = match state.bus.subscribe_client(&user_id).await {
        Ok(subscription) => subscription,
        Err(e) => {
            error!(user_id = %user_id, %e, "client channel subscription failed");
            return Response::builder()
                .status(500)
                .body("Internal error".into())
                .unwrap_or_default();
        }
    };

    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state, user_id, subscription))
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    user_id: UserSessionId,
    mut subscription: Subscription,
) {
    info!(user_id = %user_id, "WebSocket connected");

    let (sender, mut receiver) = socket.split();
    let sender = Arc::new(Mutex::new(sender));

    // Pump the user's client channel to the browser verbatim.
    let pump_sender = sender.clone();
    let pump_user = user_id.clone();
    let pump = tokio::spawn(async move {
        while let Some(payload) = subscription.recv().await {
            let text = match String::from_utf8(payload) {
                Ok(text) => text,
                Err(e) => {
                    warn!(user_id = %pump_user, %e, "dropping non-UTF-8 client message");
                    continue;
                }
            };
            let mut guard = pump_sender.lock().await;
            if guard.send(Message::text(text)).await.is_err() {
                break;
            }
        }
        debug!(user_id = %pump_user, "client channel pump stopped");
    });

    // A fresh connection is an implicit join.
    if let Err(e) = publish_rpc(&state, &user_id, &Rpc::Join).await {
        error!(user_id = %user_id, %e, "failed to publish join");
    }

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(value) => {
                    let message = ServerMessage::from_raw(user_id.clone(), value);
                    if let Err(e) = state.bus.publish_server(message).await {
                        error!(user_id = %user_id, %e, "server channel publish failed");
                        break;
                    }
                }
                Err(e) => {
                    warn!(user_id = %user_id, %e, "dropping non-JSON frame");
                }
            },
            Ok(Message::Ping(data)) => {
                let mut guard = sender.lock().await;
                let _ = guard.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                warn!(user_id = %user_id, %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // Disconnect tears the session down.
    if let Err(e) = publish_rpc(&state, &user_id, &Rpc::CloseSession).await {
        error!(user_id = %user_id, %e, "failed to publish close_session");
    }

    pump.abort();
    info!(user_id = %user_id, "WebSocket disconnected");
}

async fn publish_rpc(state: &AppState, user_id: &UserSessionId, rpc: &Rpc) -> Result<(), BusError> {
    let message = ServerMessage::new(user_id.clone(), rpc)?;
    state.bus.publish_server(message).await
}
