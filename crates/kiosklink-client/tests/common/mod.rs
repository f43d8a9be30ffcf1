//! Shared helpers for client integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use kiosklink_client::channel::{Channel, ChannelConfig};
use kiosklink_client::obs::KioskMetrics;
use kiosklink_client::testing::{MockConnector, MockServer};
use kiosklink_core::protocol::Vocabulary;

pub struct Harness<V: Vocabulary> {
    pub connector: MockConnector,
    pub metrics: Arc<KioskMetrics>,
    pub channel: Channel<V>,
}

pub fn harness<V: Vocabulary>() -> Harness<V> {
    harness_with(ChannelConfig::new(format!("ws://mock/{}", V::CHANNEL)))
}

pub fn harness_with<V: Vocabulary>(config: ChannelConfig) -> Harness<V> {
    let connector = MockConnector::new();
    let metrics = Arc::new(KioskMetrics::default());
    let channel = Channel::new(config, Arc::new(connector.clone()), Arc::clone(&metrics));
    Harness {
        connector,
        metrics,
        channel,
    }
}

impl<V: Vocabulary> Harness<V> {
    /// Connect and return the far end of the socket.
    pub async fn open(&self) -> MockServer {
        self.channel.connect().await.expect("connect");
        self.connector.accept().await.expect("server end")
    }
}

/// Let spawned tasks run without advancing the (possibly paused) clock.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Yield until `f` holds.
pub async fn wait_until<F: Fn() -> bool>(f: F) {
    for _ in 0..10_000 {
        if f() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
