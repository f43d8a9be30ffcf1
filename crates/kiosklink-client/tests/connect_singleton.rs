//! Connect deduplication and deliberate disconnect.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kiosklink_client::channel::ConnectionState;
use kiosklink_client::transport::{CloseFrame, WsFrame};
use kiosklink_core::error::KioskError;
use kiosklink_core::protocol::{Backend, Vision};

use common::{harness, settle, wait_until};

#[tokio::test(start_paused = true)]
async fn concurrent_connects_share_one_attempt() {
    let h = harness::<Vision>();
    h.connector.set_delay(Duration::from_millis(50));

    let (a, b, c) = tokio::join!(h.channel.connect(), h.channel.connect(), h.channel.connect());
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(h.connector.attempts(), 1);
    assert_eq!(h.channel.state(), ConnectionState::Open);

    // Already open: resolves without a new attempt.
    h.channel.connect().await.unwrap();
    assert_eq!(h.connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn handles_from_clones_share_the_attempt() {
    let h = harness::<Backend>();
    h.connector.set_delay(Duration::from_millis(20));
    let other = h.channel.clone();

    let (a, b) = tokio::join!(h.channel.connect(), other.connect());
    a.unwrap();
    b.unwrap();
    assert_eq!(h.connector.attempts(), 1);
    assert!(other.is_connected());
}

#[tokio::test(start_paused = true)]
async fn failed_attempt_rejects_every_waiter() {
    let h = harness::<Vision>();
    h.connector.set_delay(Duration::from_millis(10));
    h.connector.fail_next(1);

    let errors = Arc::new(AtomicUsize::new(0));
    let e = Arc::clone(&errors);
    let _sub = h.channel.on_error(move |err| {
        assert_eq!(err.code().as_str(), "TRANSPORT");
        e.fetch_add(1, Ordering::SeqCst);
    });

    let (a, b) = tokio::join!(h.channel.connect(), h.channel.connect());
    assert!(matches!(a, Err(KioskError::Transport(_))));
    assert!(matches!(b, Err(KioskError::Transport(_))));
    assert_eq!(h.connector.attempts(), 1);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(h.channel.state(), ConnectionState::Closed);
    assert!(h.channel.reconnect_scheduled());
}

#[tokio::test(start_paused = true)]
async fn dropped_connect_future_still_completes() {
    let h = harness::<Backend>();
    h.connector.set_delay(Duration::from_millis(50));

    let res = tokio::time::timeout(Duration::from_millis(1), h.channel.connect()).await;
    assert!(res.is_err(), "attempt should still be in flight");
    assert_eq!(h.channel.state(), ConnectionState::Connecting);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(h.channel.is_connected());
    assert_eq!(h.connector.attempts(), 1);
}

#[tokio::test]
async fn disconnect_sends_normal_closure_and_allows_fresh_connect() {
    let h = harness::<Vision>();
    let mut server = h.open().await;

    let closes = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&closes);
    let _sub = h.channel.on_disconnect(move |info| {
        assert_eq!(info.code, 1000);
        c.fetch_add(1, Ordering::SeqCst);
    });

    h.channel.disconnect();
    assert!(!h.channel.is_connected());
    assert_eq!(
        server.recv().await,
        Some(WsFrame::Close(Some(CloseFrame::normal())))
    );

    wait_until(|| h.channel.state() == ConnectionState::Closed).await;
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(!h.channel.reconnect_scheduled());

    let _server = h.open().await;
    assert_eq!(h.connector.attempts(), 2);
    assert!(h.channel.is_connected());
}

#[tokio::test(start_paused = true)]
async fn disconnect_during_attempt_aborts_it() {
    let h = harness::<Backend>();
    h.connector.set_delay(Duration::from_millis(50));

    let ch = h.channel.clone();
    let attempt = tokio::spawn(async move { ch.connect().await });
    settle().await;
    assert_eq!(h.channel.state(), ConnectionState::Connecting);
    assert_eq!(h.connector.in_flight(), 1);

    h.channel.disconnect();
    assert_eq!(h.channel.state(), ConnectionState::Closed);

    let res = attempt.await.unwrap();
    assert_eq!(res, Err(KioskError::ConnectionClosed));
    settle().await;
    assert_eq!(h.connector.in_flight(), 0);
    assert!(!h.channel.reconnect_scheduled());

    // The attempt never produced a socket.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.connector.try_accept().is_none());
    assert_eq!(h.channel.state(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn reconnect_after_disconnect_never_overlaps_the_aborted_attempt() {
    let h = harness::<Vision>();
    h.connector.set_delay(Duration::from_secs(60));

    let ch = h.channel.clone();
    let first = tokio::spawn(async move { ch.connect().await });
    settle().await;
    assert_eq!(h.connector.in_flight(), 1);

    h.channel.disconnect();
    assert_eq!(first.await.unwrap(), Err(KioskError::ConnectionClosed));

    let ch = h.channel.clone();
    let second = tokio::spawn(async move { ch.connect().await });
    settle().await;
    assert_eq!(h.connector.attempts(), 2);
    assert_eq!(h.connector.in_flight(), 1);
    assert_eq!(h.channel.state(), ConnectionState::Connecting);

    second.await.unwrap().unwrap();
    assert!(h.channel.is_connected());
    assert_eq!(h.connector.in_flight(), 0);
    assert!(h.connector.accept().await.is_some());
    assert!(h.connector.try_accept().is_none());
}
