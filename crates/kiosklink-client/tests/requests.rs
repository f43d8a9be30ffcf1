//! Request/response correlation on the vision channel.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use kiosklink_client::channel::{ChannelConfig, ReconnectPolicy};
use kiosklink_core::error::KioskError;
use kiosklink_core::protocol::vision::HandGesture;
use kiosklink_core::protocol::Vision;

use common::{advance, harness, harness_with, settle, wait_until};

#[tokio::test]
async fn gesture_request_resolves_with_matching_response() {
    let h = harness::<Vision>();
    let mut server = h.open().await;

    let ch = h.channel.clone();
    let call = tokio::spawn(async move { ch.request_hand_gesture().await });

    let req = server.recv_envelope().await.unwrap();
    assert_eq!(req["header"]["name"], "REQ_HAND_GESTURE");
    assert_eq!(req["header"]["sender"], "FRONTEND");
    let request_id = req["data"]["request_id"].as_str().unwrap().to_string();
    assert_ne!(req["header"]["id"].as_str().unwrap(), request_id);
    assert_eq!(h.channel.pending_len(), 1);

    server.send_envelope(
        "RES_HAND_GESTURE",
        json!({ "request_id": request_id, "gesture": "ROCK", "confidence": 0.93 }),
    );

    let res = call.await.unwrap().unwrap();
    assert_eq!(res.request_id, request_id);
    assert_eq!(res.gesture, HandGesture::Rock);
    assert_eq!(res.confidence, Some(0.93));
    assert_eq!(h.channel.pending_len(), 0);
}

#[tokio::test]
async fn concurrent_requests_each_get_their_own_response() {
    let h = harness::<Vision>();
    let mut server = h.open().await;

    let calls: Vec<_> = (0..3)
        .map(|_| {
            let ch = h.channel.clone();
            tokio::spawn(async move { ch.request_hand_gesture().await })
        })
        .collect();

    let mut ids = Vec::new();
    for _ in 0..3 {
        let req = server.recv_envelope().await.unwrap();
        ids.push(req["data"]["request_id"].as_str().unwrap().to_string());
    }

    // Answer out of order; each gesture identifies the request it answers.
    let gestures = ["ROCK", "PAPER", "SCISSORS"];
    let mut expected = HashMap::new();
    for (id, gesture) in ids.iter().rev().zip(gestures) {
        expected.insert(id.clone(), HandGesture::from(gesture.to_string()));
        server.send_envelope("RES_HAND_GESTURE", json!({ "request_id": id, "gesture": gesture }));
    }

    for call in calls {
        let res = call.await.unwrap().unwrap();
        assert_eq!(expected.get(&res.request_id), Some(&res.gesture));
    }
    assert_eq!(h.channel.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn unanswered_request_times_out_and_late_response_is_dropped() {
    let h = harness::<Vision>();
    let mut server = h.open().await;

    let ch = h.channel.clone();
    let call = tokio::spawn(async move { ch.request_hand_gesture().await });
    let req = server.recv_envelope().await.unwrap();
    let request_id = req["data"]["request_id"].as_str().unwrap().to_string();

    advance(9_900).await;
    assert_eq!(h.channel.pending_len(), 1);
    advance(200).await;

    assert_eq!(call.await.unwrap().unwrap_err(), KioskError::Timeout);
    assert_eq!(h.channel.pending_len(), 0);

    server.send_envelope("RES_HAND_GESTURE", json!({ "request_id": request_id, "gesture": "PAPER" }));
    wait_until(|| h.metrics.dropped.get(&[("channel", "vision"), ("reason", "orphan")]) == 1).await;
    assert!(h.channel.is_connected());
    assert_eq!(
        h.metrics.requests.get(&[("channel", "vision"), ("outcome", "timeout")]),
        1
    );
}

#[tokio::test]
async fn request_while_disconnected_fails_without_sending() {
    let h = harness::<Vision>();

    let err = h.channel.request_hand_gesture().await.unwrap_err();
    assert_eq!(err, KioskError::NotConnected);
    assert_eq!(err.code().as_str(), "NOT_CONNECTED");
    assert_eq!(h.connector.attempts(), 0);
    assert_eq!(h.channel.pending_len(), 0);
}

#[tokio::test]
async fn close_rejects_pending_before_disconnect_listeners_run() {
    let h = harness::<Vision>();
    let mut server = h.open().await;

    let seen = Arc::new(Mutex::new(None));
    let s = Arc::clone(&seen);
    let ch = h.channel.clone();
    let _sub = h.channel.on_disconnect(move |info| {
        *s.lock().unwrap() = Some((info.code, ch.pending_len()));
    });

    let calls: Vec<_> = (0..2)
        .map(|_| {
            let ch = h.channel.clone();
            tokio::spawn(async move { ch.request_hand_gesture().await })
        })
        .collect();
    server.recv_envelope().await.unwrap();
    server.recv_envelope().await.unwrap();

    server.close(4002);
    for call in calls {
        assert_eq!(call.await.unwrap().unwrap_err(), KioskError::ConnectionClosed);
    }
    wait_until(|| seen.lock().unwrap().is_some()).await;
    assert_eq!(*seen.lock().unwrap(), Some((4002, 0)));
}

#[tokio::test]
async fn duplicate_response_resolves_once() {
    let h = harness::<Vision>();
    let mut server = h.open().await;

    let ch = h.channel.clone();
    let call = tokio::spawn(async move { ch.request_hand_gesture().await });
    let req = server.recv_envelope().await.unwrap();
    let id = req["data"]["request_id"].clone();

    server.send_envelope("RES_HAND_GESTURE", json!({ "request_id": id, "gesture": "SCISSORS" }));
    server.send_envelope("RES_HAND_GESTURE", json!({ "request_id": id, "gesture": "ROCK" }));

    assert_eq!(call.await.unwrap().unwrap().gesture, HandGesture::Scissors);
    wait_until(|| h.metrics.dropped.get(&[("channel", "vision"), ("reason", "orphan")]) == 1).await;
    assert_eq!(
        h.metrics.requests.get(&[("channel", "vision"), ("outcome", "resolved")]),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn abandoned_request_stays_pending_until_it_expires() {
    let h = harness::<Vision>();
    let mut server = h.open().await;

    let res = tokio::time::timeout(Duration::from_millis(10), h.channel.request_hand_gesture()).await;
    assert!(res.is_err());
    server.recv_envelope().await.unwrap();
    assert_eq!(h.channel.pending_len(), 1);

    advance(10_000).await;
    settle().await;
    assert_eq!(h.channel.pending_len(), 0);
}

#[tokio::test]
async fn disconnect_rejects_pending_requests() {
    let h = harness::<Vision>();
    let mut server = h.open().await;

    let ch = h.channel.clone();
    let call = tokio::spawn(async move { ch.request_hand_gesture().await });
    server.recv_envelope().await.unwrap();

    h.channel.disconnect();
    assert_eq!(call.await.unwrap().unwrap_err(), KioskError::ConnectionClosed);
    assert_eq!(h.channel.pending_len(), 0);
}

#[tokio::test]
async fn response_without_request_id_is_dropped() {
    let h = harness::<Vision>();
    let server = h.open().await;

    server.send_envelope("RES_HAND_GESTURE", json!({ "gesture": "ROCK" }));
    wait_until(|| h.metrics.dropped.get(&[("channel", "vision"), ("reason", "orphan")]) == 1).await;
    assert!(h.channel.is_connected());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn request_racing_a_close_never_waits_for_the_timeout() {
    for _ in 0..25 {
        let mut config = ChannelConfig::new("ws://mock/vision");
        config.reconnect = ReconnectPolicy::Disabled;
        let h = harness_with::<Vision>(config);
        let server = h.open().await;

        let ch = h.channel.clone();
        let call = tokio::spawn(async move { ch.request_hand_gesture().await });
        server.close(1011);

        let res = tokio::time::timeout(Duration::from_secs(2), call)
            .await
            .expect("request left hanging after close")
            .unwrap();
        assert!(matches!(
            res,
            Err(KioskError::NotConnected) | Err(KioskError::ConnectionClosed)
        ));
        assert_eq!(h.channel.pending_len(), 0);
    }
}
