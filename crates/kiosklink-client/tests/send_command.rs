//! Fire-and-forget outbound commands.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::time::Duration;

use serde_json::json;

use kiosklink_client::channel::ConnectionState;
use kiosklink_core::protocol::backend::{BackendCommand, GameSignal};
use kiosklink_core::protocol::{Backend, Vision};

use common::{harness, settle};

#[tokio::test]
async fn command_while_disconnected_is_dropped_not_queued() {
    let h = harness::<Backend>();

    assert!(!h.channel.send(BackendCommand::Start));
    assert_eq!(
        h.metrics.outbound.get(&[("channel", "backend"), ("outcome", "not_connected")]),
        1
    );

    let mut server = h.open().await;
    settle().await;
    assert!(server.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn command_while_connecting_is_dropped_not_queued() {
    let h = harness::<Backend>();
    h.connector.set_delay(Duration::from_millis(50));

    let ch = h.channel.clone();
    let attempt = tokio::spawn(async move { ch.connect().await });
    settle().await;
    assert_eq!(h.channel.state(), ConnectionState::Connecting);

    assert!(!h.channel.send(BackendCommand::Start));
    assert_eq!(
        h.metrics.outbound.get(&[("channel", "backend"), ("outcome", "not_connected")]),
        1
    );

    attempt.await.unwrap().unwrap();
    let mut server = h.connector.accept().await.unwrap();
    settle().await;
    assert!(server.try_recv().is_none());
}

#[tokio::test]
async fn game_result_goes_out_as_one_envelope() {
    let h = harness::<Backend>();
    let mut server = h.open().await;

    assert!(h.channel.send(BackendCommand::GameResult {
        minigame: "rps".into(),
        result: "WIN".into(),
        score: Some(3),
    }));

    let env = server.recv_envelope().await.unwrap();
    assert_eq!(env["header"]["name"], "GAME_RESULT");
    assert_eq!(env["header"]["sender"], "FRONTEND");
    assert!(!env["header"]["id"].as_str().unwrap().is_empty());
    assert!(env["header"]["timestamp"].as_u64().unwrap() > 0);
    assert_eq!(env["data"], json!({ "minigame": "rps", "result": "WIN", "score": 3 }));
}

#[tokio::test]
async fn ui_events_keep_their_order() {
    let h = harness::<Backend>();
    let mut server = h.open().await;

    assert!(h.channel.send(BackendCommand::Start));
    assert!(h.channel.send(BackendCommand::MinigameSelected { minigame: "memory".into() }));
    assert!(h.channel.send(BackendCommand::MinigameEvent {
        minigame: "memory".into(),
        event: "FLIP".into(),
        detail: json!({ "card": 4 }),
    }));
    assert!(h.channel.send(BackendCommand::Cancel));

    let mut names = Vec::new();
    for _ in 0..4 {
        let env = server.recv_envelope().await.unwrap();
        names.push(env["header"]["name"].as_str().unwrap().to_string());
    }
    assert_eq!(names, ["START", "MINIGAME_SELECTED", "MINIGAME_EVENT", "CANCEL"]);
}

#[tokio::test]
async fn vision_mirrors_scene_and_game_lifecycle() {
    let h = harness::<Vision>();
    let mut server = h.open().await;

    assert!(h.channel.send_scene("HAND_GESTURE"));
    assert!(h.channel.send_game_start(&GameSignal { game: Some("rps".into()) }));
    assert!(h.channel.send_game_stop(&GameSignal::default()));

    let scene = server.recv_envelope().await.unwrap();
    assert_eq!(scene["header"]["name"], "SET_SCENE");
    assert_eq!(scene["data"], json!({ "scene": "HAND_GESTURE" }));

    let start = server.recv_envelope().await.unwrap();
    assert_eq!(start["header"]["name"], "GAME_START");
    assert_eq!(start["data"], json!({ "game": "rps" }));

    let stop = server.recv_envelope().await.unwrap();
    assert_eq!(stop["header"]["name"], "GAME_STOP");
    assert_eq!(stop["data"], json!({}));
}
