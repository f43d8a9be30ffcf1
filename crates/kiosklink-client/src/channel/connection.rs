//! Generic connection manager.
//!
//! One `Channel<V>` owns one logical upstream endpoint. Clones are handles to
//! the same channel. State lives behind a short-held `std::sync::Mutex` that
//! is never held across an `.await` or while listeners run.
//!
//! Socket ownership:
//! - `connect()` spawns one attempt task; concurrent callers share its
//!   completion, so there is never more than one physical attempt in flight.
//!   `disconnect()` aborts a running attempt and its waiters see
//!   `ConnectionClosed` at once.
//! - An open socket is driven by a single IO task that writes queued
//!   outbound frames and routes inbound frames in transport order.
//! - Each attempt bumps `generation`; a close reported by a socket that has
//!   since been superseded is ignored.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, Shared};
use futures_util::{FutureExt, SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, trace, warn};

use kiosklink_core::error::{KioskError, Result};
use kiosklink_core::protocol::envelope::Envelope;
use kiosklink_core::protocol::frame::CameraFrame;
use kiosklink_core::protocol::vocabulary::Vocabulary;

use crate::channel::reconnect::{Backoff, ReconnectPolicy};
use crate::channel::state::{CloseInfo, ConnectionState};
use crate::dispatch::pending::{PendingTable, Response};
use crate::dispatch::{ListenerSet, Router, Subscription};
use crate::obs::KioskMetrics;
use crate::transport::codec::{self, Inbound};
use crate::transport::{CloseFrame, Connector, FrameReader, FrameWriter, WsFrame};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-channel settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    pub url: String,
    /// Accept camera frames on the binary lane.
    pub binary_frames: bool,
    pub request_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            binary_frames: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

type ConnectFuture = Shared<BoxFuture<'static, Result<()>>>;

struct ConnState {
    status: ConnectionState,
    outbound: Option<mpsc::UnboundedSender<WsFrame>>,
    connecting: Option<ConnectFuture>,
    attempt: Option<AbortHandle>,
    should_reconnect: bool,
    reconnect_timer: Option<JoinHandle<()>>,
    generation: u64,
    backoff: Backoff,
}

struct ChannelInner<V: Vocabulary> {
    config: ChannelConfig,
    connector: Arc<dyn Connector>,
    metrics: Arc<KioskMetrics>,
    router: Router<V>,
    pending: Arc<PendingTable>,
    on_connect: ListenerSet<()>,
    on_disconnect: ListenerSet<CloseInfo>,
    on_error: ListenerSet<KioskError>,
    state: Mutex<ConnState>,
}

pub struct Channel<V: Vocabulary> {
    inner: Arc<ChannelInner<V>>,
}

impl<V: Vocabulary> Clone for Channel<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Vocabulary> std::fmt::Debug for Channel<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("channel", &V::CHANNEL)
            .field("url", &self.inner.config.url)
            .field("state", &self.state())
            .finish()
    }
}

impl<V: Vocabulary> Channel<V> {
    pub fn new(
        config: ChannelConfig,
        connector: Arc<dyn Connector>,
        metrics: Arc<KioskMetrics>,
    ) -> Self {
        let pending = Arc::new(PendingTable::new(V::CHANNEL, Arc::clone(&metrics)));
        let backoff = Backoff::new(config.reconnect.clone());
        Self {
            inner: Arc::new(ChannelInner {
                router: Router::new(Arc::clone(&pending), Arc::clone(&metrics)),
                pending,
                connector,
                metrics,
                on_connect: ListenerSet::new(V::CHANNEL),
                on_disconnect: ListenerSet::new(V::CHANNEL),
                on_error: ListenerSet::new(V::CHANNEL),
                state: Mutex::new(ConnState {
                    status: ConnectionState::Idle,
                    outbound: None,
                    connecting: None,
                    attempt: None,
                    should_reconnect: true,
                    reconnect_timer: None,
                    generation: 0,
                    backoff,
                }),
                config,
            }),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    fn lock(&self) -> MutexGuard<'_, ConnState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().status
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Whether a reconnect timer is currently armed.
    pub fn reconnect_scheduled(&self) -> bool {
        self.lock().reconnect_timer.is_some()
    }

    /// Number of requests awaiting a response.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.len()
    }

    /// Open the channel. Idempotent: resolves at once when already open and
    /// joins the in-flight attempt when one is running.
    ///
    /// The attempt runs in its own task, so it completes even if this future
    /// is dropped. A failed attempt notifies `on_error` listeners and
    /// schedules a reconnect before the error is returned.
    pub async fn connect(&self) -> Result<()> {
        let attempt = {
            let mut st = self.lock();
            st.should_reconnect = true;
            if st.status == ConnectionState::Open {
                return Ok(());
            }
            match st.connecting.clone() {
                Some(inflight) => inflight,
                None => self.begin_connect(&mut st),
            }
        };
        attempt.await
    }

    fn begin_connect(&self, st: &mut ConnState) -> ConnectFuture {
        if let Some(timer) = st.reconnect_timer.take() {
            timer.abort();
        }
        if let Some(stale) = st.attempt.take() {
            stale.abort();
        }
        st.status = ConnectionState::Connecting;
        st.outbound = None;
        st.generation += 1;
        let generation = st.generation;

        let this = self.clone();
        let task = tokio::spawn(async move { this.establish(generation).await });
        st.attempt = Some(task.abort_handle());
        let attempt: BoxFuture<'static, Result<()>> = async move {
            match task.await {
                Ok(res) => res,
                Err(e) if e.is_cancelled() => Err(KioskError::ConnectionClosed),
                Err(e) => Err(KioskError::Internal(format!("connect task failed: {e}"))),
            }
        }
        .boxed();

        let attempt = attempt.shared();
        st.connecting = Some(attempt.clone());
        attempt
    }

    async fn establish(self, generation: u64) -> Result<()> {
        let url = self.inner.config.url.clone();
        info!(channel = V::CHANNEL, url = %url, "connecting");

        match self.inner.connector.connect(&url).await {
            Ok((reader, mut writer)) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let current = {
                    let mut st = self.lock();
                    let current = st.generation == generation
                        && st.status == ConnectionState::Connecting;
                    if current {
                        st.status = ConnectionState::Open;
                        st.outbound = Some(tx);
                        st.connecting = None;
                        st.attempt = None;
                        st.backoff.reset();
                    }
                    current
                };
                if !current {
                    debug!(channel = V::CHANNEL, "connect attempt abandoned, closing socket");
                    let _ = writer.send(WsFrame::Close(Some(CloseFrame::normal()))).await;
                    return Err(KioskError::ConnectionClosed);
                }

                let labels = [("channel", V::CHANNEL)];
                self.inner
                    .metrics
                    .connects
                    .inc(&[("channel", V::CHANNEL), ("outcome", "ok")]);
                self.inner.metrics.connected.set(&labels, 1);
                info!(channel = V::CHANNEL, url = %url, "connected");

                self.inner.on_connect.emit(&());

                let this = self.clone();
                tokio::spawn(async move { this.run_socket(generation, reader, writer, rx).await });
                Ok(())
            }
            Err(e) => {
                {
                    let mut st = self.lock();
                    if st.generation != generation {
                        return Err(e);
                    }
                    st.status = ConnectionState::Closed;
                    st.connecting = None;
                    st.attempt = None;
                }

                self.inner
                    .metrics
                    .connects
                    .inc(&[("channel", V::CHANNEL), ("outcome", "error")]);
                warn!(channel = V::CHANNEL, url = %url, error = %e, "connect failed");

                self.inner.on_error.emit(&e);
                self.schedule_reconnect();
                Err(e)
            }
        }
    }

    async fn run_socket(
        self,
        generation: u64,
        mut reader: FrameReader,
        mut writer: FrameWriter,
        mut rx: mpsc::UnboundedReceiver<WsFrame>,
    ) {
        let binary_lane = self.inner.config.binary_frames;

        let close = loop {
            tokio::select! {
                biased;

                out = rx.recv() => match out {
                    Some(frame) => {
                        let closing = matches!(frame, WsFrame::Close(_));
                        if let Err(e) = writer.send(frame).await {
                            warn!(channel = V::CHANNEL, error = %e, "write failed");
                            break CloseInfo::abnormal(e.to_string());
                        }
                        if closing {
                            break CloseInfo::normal("closed by client");
                        }
                    }
                    None => break CloseInfo::normal("closed by client"),
                },

                item = reader.next() => match item {
                    Some(Ok(frame)) => match codec::decode(frame, binary_lane) {
                        Ok(Inbound::Close(frame)) => break CloseInfo::from_frame(frame),
                        Ok(Inbound::Ping(_)) | Ok(Inbound::Pong(_)) => {
                            trace!(channel = V::CHANNEL, "control frame");
                        }
                        Ok(inbound) => {
                            self.inner.router.route(inbound);
                        }
                        Err(e) => {
                            self.inner
                                .metrics
                                .decode_errors
                                .inc(&[("channel", V::CHANNEL)]);
                            warn!(channel = V::CHANNEL, code = e.code().as_str(), error = %e, "undecodable frame, dropped");
                        }
                    },
                    Some(Err(e)) => {
                        warn!(channel = V::CHANNEL, error = %e, "read failed");
                        break CloseInfo::abnormal(e.to_string());
                    }
                    None => break CloseInfo::abnormal("stream ended"),
                },
            }
        };

        let _ = writer.close().await;
        self.handle_close(generation, close);
    }

    fn handle_close(&self, generation: u64, info: CloseInfo) {
        let reconnect = {
            let mut st = self.lock();
            if st.generation != generation {
                debug!(channel = V::CHANNEL, "superseded socket closed");
                return;
            }
            st.status = ConnectionState::Closed;
            st.outbound = None;
            st.should_reconnect && !info.is_normal()
        };

        self.inner
            .metrics
            .connected
            .set(&[("channel", V::CHANNEL)], 0);

        let rejected = self.inner.pending.drain(KioskError::ConnectionClosed);
        if info.is_normal() {
            info!(channel = V::CHANNEL, code = info.code, reason = %info.reason, rejected, "disconnected");
        } else {
            warn!(channel = V::CHANNEL, code = info.code, reason = %info.reason, rejected, "connection lost");
        }

        self.inner.on_disconnect.emit(&info);
        if reconnect {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&self) {
        let mut st = self.lock();
        if !st.should_reconnect
            || st.reconnect_timer.is_some()
            || matches!(st.status, ConnectionState::Open | ConnectionState::Connecting)
        {
            return;
        }
        let Some(delay) = st.backoff.next_delay() else {
            debug!(channel = V::CHANNEL, "reconnect disabled");
            return;
        };

        self.inner
            .metrics
            .reconnects_scheduled
            .inc(&[("channel", V::CHANNEL)]);
        info!(
            channel = V::CHANNEL,
            attempt = st.backoff.attempt(),
            delay_ms = delay.as_millis() as u64,
            "reconnect scheduled"
        );

        let this = self.clone();
        st.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.fire_reconnect();
        }));
    }

    fn fire_reconnect(&self) {
        let mut st = self.lock();
        st.reconnect_timer = None;
        if !st.should_reconnect
            || matches!(st.status, ConnectionState::Open | ConnectionState::Connecting)
        {
            return;
        }
        // The attempt task drives itself; its outcome is handled in `establish`.
        drop(self.begin_connect(&mut st));
    }

    /// Close deliberately: no reconnect follows. Pending requests fail with
    /// `ConnectionClosed`; a later `connect()` starts from scratch.
    pub fn disconnect(&self) {
        let outbound = {
            let mut st = self.lock();
            st.should_reconnect = false;
            if let Some(timer) = st.reconnect_timer.take() {
                timer.abort();
            }
            match st.status {
                ConnectionState::Open => {
                    st.status = ConnectionState::Closing;
                    st.outbound.take()
                }
                ConnectionState::Connecting => {
                    if let Some(attempt) = st.attempt.take() {
                        debug!(channel = V::CHANNEL, "aborting connect attempt");
                        attempt.abort();
                    }
                    st.generation += 1;
                    st.connecting = None;
                    st.status = ConnectionState::Closed;
                    None
                }
                _ => None,
            }
        };

        if let Some(tx) = outbound {
            info!(channel = V::CHANNEL, "closing");
            self.inner
                .metrics
                .connected
                .set(&[("channel", V::CHANNEL)], 0);
            let _ = tx.send(WsFrame::Close(Some(CloseFrame::normal())));
        }
        self.inner.pending.drain(KioskError::ConnectionClosed);
    }

    /// Fire-and-forget send. Returns `false` (and drops the message) when
    /// the channel is not open; nothing is queued for later.
    pub fn send_command(&self, name: &str, payload: Value) -> bool {
        let Some(tx) = self.open_sender() else {
            debug!(channel = V::CHANNEL, name, "not connected, command dropped");
            self.count_outbound("not_connected");
            return false;
        };

        let text = match Envelope::outbound(name, payload).encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(channel = V::CHANNEL, name, error = %e, "command encode failed");
                self.count_outbound("error");
                return false;
            }
        };

        if tx.send(WsFrame::Text(text)).is_err() {
            debug!(channel = V::CHANNEL, name, "socket gone, command dropped");
            self.count_outbound("not_connected");
            return false;
        }
        trace!(channel = V::CHANNEL, name, "command sent");
        self.count_outbound("sent");
        true
    }

    /// Send `name` with `payload` plus a fresh `request_id` and wait for the
    /// response carrying the same id.
    ///
    /// Fails with `NotConnected` without sending when the channel is not
    /// open, `Timeout` once the request timeout elapses, and
    /// `ConnectionClosed` when the socket closes first. Dropping the future
    /// leaves the entry pending until one of those paths fires.
    pub async fn request(&self, name: &str, payload: Value) -> Result<Response> {
        let mut payload = match payload {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                return Err(KioskError::Internal(format!(
                    "{name}: request payload must be an object, got {other}"
                )))
            }
        };

        let pending = &self.inner.pending;
        // Registered under the state lock so a concurrent close drains it.
        let registered = {
            let st = self.lock();
            match (st.status, st.outbound.as_ref()) {
                (ConnectionState::Open, Some(tx)) => {
                    let (request_id, rx) = pending.register();
                    Some((tx.clone(), request_id, rx))
                }
                _ => None,
            }
        };
        let Some((tx, request_id, rx)) = registered else {
            debug!(channel = V::CHANNEL, name, "not connected, request refused");
            self.inner
                .metrics
                .requests
                .inc(&[("channel", V::CHANNEL), ("outcome", "not_connected")]);
            return Err(KioskError::NotConnected);
        };
        payload.insert("request_id".into(), json!(request_id));

        let text = match Envelope::outbound(name, Value::Object(payload)).encode() {
            Ok(text) => text,
            Err(e) => {
                pending.reject(&request_id, e.clone(), "send_failed");
                return Err(e);
            }
        };

        let table = Arc::clone(pending);
        let timeout = self.inner.config.request_timeout;
        let expiring = request_id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if table.expire(&expiring) {
                warn!(channel = V::CHANNEL, request_id = %expiring, "request timed out");
            }
        });
        pending.arm_timer(&request_id, timer);

        debug!(channel = V::CHANNEL, name, request_id = %request_id, "request sent");
        if tx.send(WsFrame::Text(text)).is_err() {
            pending.reject(&request_id, KioskError::ConnectionClosed, "send_failed");
        }

        rx.await.unwrap_or(Err(KioskError::ConnectionClosed))
    }

    fn open_sender(&self) -> Option<mpsc::UnboundedSender<WsFrame>> {
        let st = self.lock();
        match st.status {
            ConnectionState::Open => st.outbound.clone(),
            _ => None,
        }
    }

    fn count_outbound(&self, outcome: &str) {
        self.inner
            .metrics
            .outbound
            .inc(&[("channel", V::CHANNEL), ("outcome", outcome)]);
    }

    /// Every recognized push message, narrowed to the channel's type.
    pub fn add_message_listener<F>(&self, f: F) -> Subscription
    where
        F: Fn(&Envelope<V::Message>) + Send + Sync + 'static,
    {
        self.inner.router.messages().add(f)
    }

    /// Camera frames only. They never reach message listeners.
    pub fn add_frame_listener<F>(&self, f: F) -> Subscription
    where
        F: Fn(&CameraFrame) + Send + Sync + 'static,
    {
        self.inner.router.frames().add(f)
    }

    pub fn on_connect<F>(&self, f: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.on_connect.add(move |_: &()| f())
    }

    pub fn on_disconnect<F>(&self, f: F) -> Subscription
    where
        F: Fn(&CloseInfo) + Send + Sync + 'static,
    {
        self.inner.on_disconnect.add(f)
    }

    pub fn on_error<F>(&self, f: F) -> Subscription
    where
        F: Fn(&KioskError) + Send + Sync + 'static,
    {
        self.inner.on_error.add(f)
    }

    /// Route one inbound message as if it arrived on the socket.
    pub fn route(&self, inbound: Inbound) -> crate::dispatch::Routed {
        self.inner.router.route(inbound)
    }
}
