use livecast_services::SessionError;
use livecast_services::UserSessionId;
use livecast_services::rtc::RtcError;

use crate::fixtures::TestHarness;

#[tokio::test]
async fn join_upserts_the_session_and_confirms_over_the_client_channel() {
    let harness = TestHarness::new(4);
    let user = UserSessionId::from("u1");

    harness.manager.start_session(user.clone()).await.unwrap();

    assert_eq!(harness.store.operation_count("save"), 1);
    assert_eq!(harness.store.operations()[0], "save:u1");
    assert!(harness.store.session("u1").unwrap().is_online);
    assert_eq!(harness.bus.client_methods(&user), vec!["join"]);
    assert_eq!(harness.metrics.session_total(), 1);
    assert_eq!(harness.manager.room_count(), 1);
}

#[tokio::test]
async fn duplicate_join_reuses_the_room() {
    let harness = TestHarness::new(4);
    let user = UserSessionId::from("u1");

    harness.manager.start_session(user.clone()).await.unwrap();
    harness.manager.start_session(user.clone()).await.unwrap();

    assert_eq!(harness.manager.room_count(), 1);
    assert_eq!(harness.metrics.session_total(), 1);
    assert_eq!(harness.store.operation_count("save"), 2);
    assert_eq!(harness.bus.client_methods(&user), vec!["join", "join"]);
}

#[tokio::test]
async fn close_session_is_idempotent() {
    let harness = TestHarness::new(4);
    let user = UserSessionId::from("u1");

    harness.manager.start_session(user.clone()).await.unwrap();
    harness.manager.close_session(user.clone()).await.unwrap();
    harness.manager.close_session(user.clone()).await.unwrap();

    assert_eq!(harness.store.operation_count("set_offline"), 1);
    assert_eq!(harness.metrics.session_total(), 0);
    assert_eq!(harness.manager.room_count(), 0);
}

#[tokio::test]
async fn port_exhaustion_fails_the_second_session_cleanly() {
    // One free port, one codec per participant.
    let harness = TestHarness::new(1);

    harness
        .manager
        .start_session(UserSessionId::from("u1"))
        .await
        .unwrap();

    let second = harness
        .manager
        .start_session(UserSessionId::from("u2"))
        .await;
    assert!(matches!(
        second,
        Err(SessionError::Rtc(RtcError::NoFreePorts))
    ));

    // No half-initialized room is left behind, and u2 got no confirmation.
    assert_eq!(harness.manager.room_count(), 1);
    assert!(harness.bus.client_methods(&UserSessionId::from("u2")).is_empty());
    assert_eq!(harness.metrics.session_total(), 1);

    // Closing the first session frees the port for the next join.
    harness
        .manager
        .close_session(UserSessionId::from("u1"))
        .await
        .unwrap();
    harness
        .manager
        .start_session(UserSessionId::from("u2"))
        .await
        .unwrap();
}

#[tokio::test]
async fn publish_marks_the_session_and_hands_the_sdp_to_a_worker() {
    let harness = TestHarness::new(4);
    let user = UserSessionId::from("u1");

    harness.manager.start_session(user.clone()).await.unwrap();
    harness.manager.publish_stream(user.clone()).await.unwrap();

    assert_eq!(harness.store.operation_count("start_publish"), 1);
    let started = harness.transcoder.started();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].0, user);
    let sdp = String::from_utf8(started[0].1.clone()).unwrap();
    assert!(sdp.contains("m=audio"));

    harness.manager.stop_stream(user.clone()).await.unwrap();
    assert_eq!(harness.store.operation_count("stop_publish"), 1);
    assert_eq!(harness.transcoder.stopped(), vec![user]);
}

#[tokio::test]
async fn publish_without_a_room_is_a_state_error() {
    let harness = TestHarness::new(4);

    let result = harness
        .manager
        .publish_stream(UserSessionId::from("ghost"))
        .await;
    assert!(matches!(result, Err(SessionError::RoomNotInitialized(_))));
}

#[tokio::test]
async fn offer_before_join_is_a_state_error() {
    let harness = TestHarness::new(4);

    let params = serde_json::from_value(serde_json::json!({
        "type": "offer",
        "sdp": "v=0\r\n",
        "target": "publisher",
    }))
    .unwrap();
    let result = harness
        .manager
        .handle_offer(UserSessionId::from("ghost"), params)
        .await;
    assert!(matches!(result, Err(SessionError::RoomNotInitialized(_))));
}

#[tokio::test]
async fn subscribe_records_viewing_intent_only() {
    let harness = TestHarness::new(4);
    let viewer = UserSessionId::from("v1");
    let streamer = UserSessionId::from("s1");

    harness
        .manager
        .subscribe(viewer.clone(), streamer.clone())
        .await
        .unwrap();
    harness
        .manager
        .unsubscribe(viewer, streamer)
        .await
        .unwrap();

    // No transports were allocated and nothing was persisted.
    assert_eq!(harness.manager.room_count(), 0);
    assert!(harness.store.operations().is_empty());
}
