use base64::Engine as _;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use webrtc::api::APIBuilder;
use webrtc::api::media_engine::MediaEngine;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use livecast_services::UserSessionId;
use livecast_services::eventbus::bus::{RpcPublisher, ServerMessage};
use livecast_services::eventbus::router::Router;

use crate::fixtures::{MemoryBus, TestHarness};
use crate::fixtures::harness::wait_for;

/// A browser-side peer connection producing a realistic offer.
async fn browser_peer() -> (RTCPeerConnection, RTCSessionDescription) {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs().unwrap();
    let api = APIBuilder::new().with_media_engine(media_engine).build();

    let pc = api.new_peer_connection(Default::default()).await.unwrap();
    pc.create_data_channel("signaling-probe", None).await.unwrap();

    let offer = pc.create_offer(None).await.unwrap();
    pc.set_local_description(offer.clone()).await.unwrap();
    (pc, offer)
}

fn ice_envelope() -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": "iceCandidate",
        "params": {
            "candidate": "candidate:1 1 udp 2130706431 127.0.0.1 54321 typ host",
            "sdpMid": "0",
            "sdpMLineIndex": 0,
            "target": "publisher",
        },
    })
}

fn offer_envelope(sdp: &str) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": "offer",
        "params": { "type": "offer", "sdp": sdp, "target": "publisher" },
    })
}

fn join_envelope() -> serde_json::Value {
    serde_json::json!({ "jsonrpc": "2.0", "method": "join", "params": null })
}

async fn publish_raw(bus: &MemoryBus, user: &UserSessionId, envelope: serde_json::Value) {
    bus.publish_server(ServerMessage::from_raw(user.clone(), envelope))
        .await
        .unwrap();
}

fn gzip_base64(input: &str) -> String {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input.as_bytes()).unwrap();
    base64::engine::general_purpose::STANDARD.encode(encoder.finish().unwrap())
}

async fn run_offer_flow(offer_sdp_field: impl FnOnce(&str) -> String) {
    let harness = TestHarness::new(4);
    let user = UserSessionId::from("u1");

    let mut router = Router::new(harness.bus.clone(), harness.manager.clone());
    router.start().await.unwrap();

    // ICE candidate arrives before the offer; it has to buffer.
    publish_raw(&harness.bus, &user, join_envelope()).await;
    publish_raw(&harness.bus, &user, ice_envelope()).await;

    let (_pc, offer) = browser_peer().await;
    publish_raw(
        &harness.bus,
        &user,
        offer_envelope(&offer_sdp_field(&offer.sdp)),
    )
    .await;

    let bus = harness.bus.clone();
    let answered = wait_for(
        || bus.client_methods(&user).contains(&"answer".to_string()),
        Duration::from_secs(5),
    )
    .await;
    assert!(
        answered,
        "expected an answer, client channel saw {:?}",
        harness.bus.client_methods(&user)
    );

    let messages = harness.bus.client_messages(&user);
    let answer = messages
        .iter()
        .find(|m| m["method"] == "answer")
        .expect("answer rpc");
    assert_eq!(answer["params"]["target"], "publisher");
    assert!(
        answer["params"]["sdp"]
            .as_str()
            .unwrap()
            .starts_with("v=0")
    );

    router.stop().await;
}

#[tokio::test]
async fn ice_before_offer_still_negotiates() {
    run_offer_flow(|sdp| sdp.to_owned()).await;
}

#[tokio::test]
async fn compressed_offer_negotiates_identically() {
    run_offer_flow(gzip_base64).await;
}

#[tokio::test]
async fn rapid_fire_signaling_yields_exactly_one_answer() {
    let harness = TestHarness::new(4);
    let user = UserSessionId::from("u1");

    let mut router = Router::new(harness.bus.clone(), harness.manager.clone());
    router.start().await.unwrap();

    let (_pc, offer) = browser_peer().await;
    publish_raw(&harness.bus, &user, join_envelope()).await;
    publish_raw(&harness.bus, &user, ice_envelope()).await;
    publish_raw(&harness.bus, &user, ice_envelope()).await;
    publish_raw(&harness.bus, &user, offer_envelope(&offer.sdp)).await;

    let bus = harness.bus.clone();
    assert!(
        wait_for(
            || bus.client_methods(&user).contains(&"answer".to_string()),
            Duration::from_secs(5),
        )
        .await
    );
    // Brief settle to catch stray duplicate answers.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let methods = harness.bus.client_methods(&user);
    assert_eq!(
        methods.iter().filter(|m| m.as_str() == "answer").count(),
        1,
        "client channel saw {methods:?}"
    );

    router.stop().await;
}
