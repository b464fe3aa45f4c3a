use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use livecast_services::UserSessionId;
use livecast_services::eventbus::bus::{RpcPublisher, ServerMessage};
use livecast_services::eventbus::router::{Router, SignalingHandler};
use livecast_services::eventbus::rpc::{IceCandidateParams, Rpc, SdpParams};

use crate::fixtures::MemoryBus;
use crate::fixtures::harness::wait_for;

#[derive(Default)]
struct RecordingHandler {
    calls: Mutex<Vec<String>>,
    panic_on_join: bool,
}

impl RecordingHandler {
    fn recording() -> Self {
        Self::default()
    }

    fn panicking() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            panic_on_join: true,
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, method: &str, user_id: &UserSessionId) {
        self.calls.lock().push(format!("{method}:{user_id}"));
    }
}

#[async_trait]
impl SignalingHandler for RecordingHandler {
    async fn on_join(&self, user_id: UserSessionId) -> anyhow::Result<()> {
        if self.panic_on_join {
            panic!("join handler exploded");
        }
        self.record("join", &user_id);
        Ok(())
    }

    async fn on_offer(&self, user_id: UserSessionId, _params: SdpParams) -> anyhow::Result<()> {
        self.record("offer", &user_id);
        Ok(())
    }

    async fn on_add_ice_candidate(
        &self,
        user_id: UserSessionId,
        _params: IceCandidateParams,
    ) -> anyhow::Result<()> {
        self.record("iceCandidate", &user_id);
        Ok(())
    }

    async fn on_close_session(&self, user_id: UserSessionId) -> anyhow::Result<()> {
        self.record("close_session", &user_id);
        Ok(())
    }

    async fn on_publish_stream(&self, user_id: UserSessionId) -> anyhow::Result<()> {
        self.record("publish", &user_id);
        Ok(())
    }

    async fn on_stop_stream(&self, user_id: UserSessionId) -> anyhow::Result<()> {
        self.record("publishStop", &user_id);
        Ok(())
    }

    async fn on_subscribe(
        &self,
        user_id: UserSessionId,
        _streamer: UserSessionId,
    ) -> anyhow::Result<()> {
        self.record("subscribe", &user_id);
        Ok(())
    }

    async fn on_unsubscribe(
        &self,
        user_id: UserSessionId,
        _streamer: UserSessionId,
    ) -> anyhow::Result<()> {
        self.record("subscribeCancel", &user_id);
        Ok(())
    }
}

fn ice_envelope() -> serde_json::Value {
    let params = IceCandidateParams {
        candidate: webrtc::ice_transport::ice_candidate::RTCIceCandidateInit {
            candidate: "candidate:1 1 udp 2130706431 127.0.0.1 54321 typ host".to_owned(),
            sdp_mid: Some("0".to_owned()),
            sdp_mline_index: Some(0),
            ..Default::default()
        },
        target: livecast_services::eventbus::SignalingTarget::Publisher,
    };
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": "iceCandidate",
        "params": serde_json::to_value(params).unwrap(),
    })
}

fn offer_envelope() -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": "offer",
        "params": {
            "type": "offer",
            "sdp": "v=0\r\no=- 0 0 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n",
            "target": "publisher",
        },
    })
}

async fn publish(bus: &MemoryBus, user: &str, rpc: &Rpc) {
    let message = ServerMessage::new(UserSessionId::from(user), rpc).unwrap();
    bus.publish_server(message).await.unwrap();
}

async fn publish_raw(bus: &MemoryBus, user: &str, envelope: serde_json::Value) {
    let message = ServerMessage::from_raw(UserSessionId::from(user), envelope);
    bus.publish_server(message).await.unwrap();
}

#[tokio::test]
async fn delivers_every_message_in_publish_order() {
    let bus = Arc::new(MemoryBus::new());
    let handler = Arc::new(RecordingHandler::recording());
    let mut router = Router::new(bus.clone(), handler.clone());
    router.start().await.unwrap();

    publish(&bus, "u1", &Rpc::Join).await;
    publish_raw(&bus, "u1", ice_envelope()).await;
    publish_raw(&bus, "u1", ice_envelope()).await;
    publish_raw(&bus, "u1", offer_envelope()).await;

    assert!(
        wait_for(|| handler.calls().len() == 4, Duration::from_secs(2)).await,
        "expected all four callbacks, got {:?}",
        handler.calls()
    );
    assert_eq!(
        handler.calls(),
        vec![
            "join:u1".to_string(),
            "iceCandidate:u1".to_string(),
            "iceCandidate:u1".to_string(),
            "offer:u1".to_string(),
        ]
    );

    router.stop().await;
}

#[tokio::test]
async fn invalid_rpcs_are_dropped_without_stopping_the_loop() {
    let bus = Arc::new(MemoryBus::new());
    let handler = Arc::new(RecordingHandler::recording());
    let mut router = Router::new(bus.clone(), handler.clone());
    router.start().await.unwrap();

    publish_raw(
        &bus,
        "u1",
        serde_json::json!({ "jsonrpc": "2.0", "method": "renegotiate", "params": null }),
    )
    .await;
    publish_raw(&bus, "u1", serde_json::json!({ "bogus": true })).await;
    publish(&bus, "u1", &Rpc::Join).await;

    assert!(wait_for(|| handler.calls().len() == 1, Duration::from_secs(2)).await);
    assert_eq!(handler.calls(), vec!["join:u1".to_string()]);

    router.stop().await;
}

#[tokio::test]
async fn a_panicking_handler_does_not_kill_dispatch() {
    let bus = Arc::new(MemoryBus::new());
    let handler = Arc::new(RecordingHandler::panicking());
    let mut router = Router::new(bus.clone(), handler.clone());
    router.start().await.unwrap();

    publish(&bus, "u1", &Rpc::Join).await;
    publish(&bus, "u1", &Rpc::CloseSession).await;

    assert!(wait_for(|| handler.calls().len() == 1, Duration::from_secs(2)).await);
    assert_eq!(handler.calls(), vec!["close_session:u1".to_string()]);

    router.stop().await;
}

#[tokio::test]
async fn stop_ends_delivery() {
    let bus = Arc::new(MemoryBus::new());
    let handler = Arc::new(RecordingHandler::recording());
    let mut router = Router::new(bus.clone(), handler.clone());
    router.start().await.unwrap();

    publish(&bus, "u1", &Rpc::Join).await;
    assert!(wait_for(|| handler.calls().len() == 1, Duration::from_secs(2)).await);

    router.stop().await;
    publish(&bus, "u1", &Rpc::Join).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handler.calls().len(), 1);
}
