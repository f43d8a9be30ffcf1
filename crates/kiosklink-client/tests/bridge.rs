//! Scene/state bridge over both channels.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use serde_json::json;

use kiosklink_client::bridge::SceneBridge;
use kiosklink_client::channel::{BackendChannel, ChannelConfig, VisionChannel};
use kiosklink_client::obs::KioskMetrics;
use kiosklink_client::testing::{MockConnector, MockServer};

mod common;
use common::{settle, wait_until};

struct Rig {
    backend: BackendChannel,
    vision: VisionChannel,
    bridge: SceneBridge,
    backend_server: MockServer,
    vision_server: MockServer,
}

async fn rig() -> Rig {
    let connector = MockConnector::new();
    let metrics = Arc::new(KioskMetrics::default());
    let backend = BackendChannel::new(
        ChannelConfig::new("ws://mock/backend"),
        Arc::new(connector.clone()),
        Arc::clone(&metrics),
    );
    let vision = VisionChannel::new(
        ChannelConfig::new("ws://mock/vision"),
        Arc::new(connector.clone()),
        metrics,
    );
    let bridge = SceneBridge::attach(&backend, &vision);

    backend.connect().await.unwrap();
    let backend_server = connector.accept().await.unwrap();
    vision.connect().await.unwrap();
    let vision_server = connector.accept().await.unwrap();

    Rig {
        backend,
        vision,
        bridge,
        backend_server,
        vision_server,
    }
}

#[tokio::test]
async fn connection_flags_follow_both_channels() {
    let r = rig().await;
    let st = r.bridge.state();
    assert!(st.backend_connected);
    assert!(st.vision_connected);

    r.vision.disconnect();
    wait_until(|| !r.bridge.state().vision_connected).await;
    assert!(r.bridge.state().backend_connected);
}

#[tokio::test]
async fn scene_change_updates_state_and_is_mirrored_to_vision() {
    let mut r = rig().await;

    r.backend_server.send_envelope(
        "SET_SCENE",
        json!({ "scene": "GIFT_PICKUP", "text": "Enjoy!", "result": "WIN" }),
    );

    wait_until(|| r.bridge.state().scene.is_some()).await;
    let st = r.bridge.state();
    assert_eq!(st.scene.as_deref(), Some("GIFT_PICKUP"));
    assert_eq!(st.scene_text.as_deref(), Some("Enjoy!"));
    assert_eq!(st.result_hint.as_deref(), Some("WIN"));

    let mirrored = r.vision_server.recv_envelope().await.unwrap();
    assert_eq!(mirrored["header"]["name"], "SET_SCENE");
    assert_eq!(mirrored["data"]["scene"], "GIFT_PICKUP");
}

#[tokio::test]
async fn progress_is_clamped() {
    let r = rig().await;

    r.backend_server.send_envelope("PROGRESS_UPDATE", json!({ "progress": 1.7, "label": "upload" }));
    wait_until(|| r.bridge.state().progress_label.is_some()).await;
    assert_eq!(r.bridge.state().progress, 1.0);

    r.backend_server.send_envelope("PROGRESS_UPDATE", json!({ "progress": -0.2 }));
    wait_until(|| r.bridge.state().progress_label.is_none()).await;
    assert_eq!(r.bridge.state().progress, 0.0);
}

#[tokio::test]
async fn system_error_is_cleared_by_next_scene() {
    let r = rig().await;

    r.backend_server.send_envelope("SYSTEM_ERROR", json!({ "message": "printer offline" }));
    wait_until(|| r.bridge.state().system_error.is_some()).await;
    assert_eq!(r.bridge.state().system_error.as_deref(), Some("printer offline"));

    r.backend_server.send_envelope("SET_SCENE", json!({ "scene": "IDLE" }));
    wait_until(|| r.bridge.state().scene.is_some()).await;
    assert_eq!(r.bridge.state().system_error, None);
}

#[tokio::test]
async fn backend_game_lifecycle_is_forwarded_vision_lifecycle_is_not() {
    let mut r = rig().await;

    r.backend_server.send_envelope("GAME_START", json!({ "game": "shooter" }));
    wait_until(|| r.bridge.state().game_active).await;
    let fwd = r.vision_server.recv_envelope().await.unwrap();
    assert_eq!(fwd["header"]["name"], "GAME_START");
    assert_eq!(fwd["data"]["game"], "shooter");

    r.vision_server.send_envelope("GAME_STOP", json!({}));
    wait_until(|| !r.bridge.state().game_active).await;

    settle().await;
    assert!(r.backend_server.try_recv().is_none());
}

#[tokio::test]
async fn backend_loss_keeps_the_last_scene() {
    let r = rig().await;

    r.backend_server.send_envelope("SET_SCENE", json!({ "scene": "QR_SCAN" }));
    wait_until(|| r.bridge.state().scene.is_some()).await;

    r.backend_server.close(4000);
    wait_until(|| !r.bridge.state().backend_connected).await;
    assert_eq!(r.bridge.state().scene.as_deref(), Some("QR_SCAN"));
}

#[tokio::test]
async fn game_result_is_reported_on_backend() {
    let mut r = rig().await;

    assert!(r.bridge.report_game_result("rps", "LOSE", None));
    let env = r.backend_server.recv_envelope().await.unwrap();
    assert_eq!(env["header"]["name"], "GAME_RESULT");
    assert_eq!(env["data"], json!({ "minigame": "rps", "result": "LOSE" }));

    r.backend.disconnect();
    assert!(!r.bridge.report_game_result("rps", "WIN", Some(1)));
}

#[tokio::test]
async fn detached_bridge_ignores_traffic() {
    let r = rig().await;
    let mut rx = r.bridge.subscribe();
    r.bridge.detach();

    r.backend_server.send_envelope("SET_SCENE", json!({ "scene": "IDLE" }));
    settle().await;
    assert!(!rx.has_changed().unwrap());
    assert_eq!(r.bridge.state().scene, None);
}
