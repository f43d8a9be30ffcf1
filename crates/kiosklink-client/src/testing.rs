//! In-memory transport for tests.
//!
//! `MockConnector` hands out socket pairs without touching the network. The
//! far end of every successful attempt is a `MockServer`, collected with
//! `accept()`, through which a test pushes inbound frames and reads what the
//! channel wrote.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{sink, stream};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use kiosklink_core::error::{KioskError, Result};
use kiosklink_core::protocol::id;

use crate::transport::{CloseFrame, Connector, FrameReader, FrameWriter, WsFrame};

struct MockInner {
    attempts: AtomicUsize,
    in_flight: AtomicUsize,
    fail_next: AtomicUsize,
    delay: Mutex<Duration>,
    urls: Mutex<Vec<String>>,
    accepted_tx: mpsc::UnboundedSender<MockServer>,
    accepted_rx: AsyncMutex<mpsc::UnboundedReceiver<MockServer>>,
}

#[derive(Clone)]
pub struct MockConnector {
    inner: Arc<MockInner>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    pub fn new() -> Self {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(MockInner {
                attempts: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                fail_next: AtomicUsize::new(0),
                delay: Mutex::new(Duration::ZERO),
                urls: Mutex::new(Vec::new()),
                accepted_tx,
                accepted_rx: AsyncMutex::new(accepted_rx),
            }),
        }
    }

    /// Physical connect attempts so far (failed ones included).
    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Attempts that have started but not yet returned or been dropped.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// URLs of every attempt, in order.
    pub fn urls(&self) -> Vec<String> {
        self.inner
            .urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Refuse the next `n` attempts.
    pub fn fail_next(&self, n: usize) {
        self.inner.fail_next.store(n, Ordering::SeqCst);
    }

    /// Hold every attempt for `delay` before it completes.
    pub fn set_delay(&self, delay: Duration) {
        *self
            .inner
            .delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Wait for the far end of the next successful attempt.
    pub async fn accept(&self) -> Option<MockServer> {
        self.inner.accepted_rx.lock().await.recv().await
    }

    /// Far end of an already accepted socket, if any.
    pub fn try_accept(&self) -> Option<MockServer> {
        self.inner.accepted_rx.try_lock().ok()?.try_recv().ok()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<(FrameReader, FrameWriter)> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(&self.inner.in_flight);
        self.inner
            .urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());

        let delay = *self
            .inner
            .delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let refused = self
            .inner
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(KioskError::Transport(format!("connect {url}: connection refused")));
        }

        let (to_client, inbound) = mpsc::unbounded_channel::<Result<WsFrame>>();
        let (outbound, from_client) = mpsc::unbounded_channel::<WsFrame>();

        let reader = stream::unfold(inbound, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        let writer = sink::unfold(outbound, |tx, frame: WsFrame| async move {
            tx.send(frame)
                .map_err(|_| KioskError::Transport("mock peer gone".into()))?;
            Ok::<_, KioskError>(tx)
        });

        let _ = self.inner.accepted_tx.send(MockServer {
            to_client,
            from_client,
        });
        Ok((Box::pin(reader), Box::pin(writer)))
    }
}

/// Counts an attempt until it returns or its future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Far end of one mock socket.
pub struct MockServer {
    to_client: mpsc::UnboundedSender<Result<WsFrame>>,
    from_client: mpsc::UnboundedReceiver<WsFrame>,
}

impl MockServer {
    pub fn send_frame(&self, frame: WsFrame) {
        let _ = self.to_client.send(Ok(frame));
    }

    pub fn send_text(&self, text: impl Into<String>) {
        self.send_frame(WsFrame::Text(text.into()));
    }

    pub fn send_binary(&self, bytes: Bytes) {
        self.send_frame(WsFrame::Binary(bytes));
    }

    /// Push a well-formed envelope named `name`.
    pub fn send_envelope(&self, name: &str, data: Value) {
        let env = json!({
            "header": {
                "id": id::message_id(),
                "name": name,
                "sender": "BACKEND",
                "timestamp": id::now_millis(),
            },
            "data": data,
        });
        self.send_text(env.to_string());
    }

    /// Close with a status code, like a peer-initiated close handshake.
    pub fn close(&self, code: u16) {
        self.send_frame(WsFrame::Close(Some(CloseFrame {
            code,
            reason: String::new(),
        })));
    }

    /// Fail the next read, like a reset connection.
    pub fn fail_read(&self) {
        let _ = self
            .to_client
            .send(Err(KioskError::Transport("connection reset".into())));
    }

    /// Vanish without a close frame.
    pub fn drop_socket(self) {}

    /// Next frame the channel wrote, `None` once the socket is gone.
    pub async fn recv(&mut self) -> Option<WsFrame> {
        self.from_client.recv().await
    }

    pub fn try_recv(&mut self) -> Option<WsFrame> {
        self.from_client.try_recv().ok()
    }

    /// Next text frame the channel wrote, parsed as JSON. Skips control
    /// frames; `None` on close or once the socket is gone.
    pub async fn recv_envelope(&mut self) -> Option<Value> {
        loop {
            match self.from_client.recv().await? {
                WsFrame::Text(text) => return serde_json::from_str(&text).ok(),
                WsFrame::Close(_) => return None,
                _ => continue,
            }
        }
    }
}
