//! Per-channel inbound router.
//!
//! Routing order for one decoded envelope:
//! 1. the channel's frame tag => frame listeners only
//! 2. a response name => the pending request named by `data.request_id`
//! 3. a known push name => typed decode once, then every message listener
//! 4. anything else => warn and drop
//!
//! Nothing here returns an error to the socket loop: a bad message never
//! takes the connection down.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{trace, warn};

use kiosklink_core::protocol::envelope::{Envelope, WireEnvelope};
use kiosklink_core::protocol::frame::{decode_json_frame, CameraFrame};
use kiosklink_core::protocol::vocabulary::{payload, Vocabulary};

use crate::dispatch::listeners::ListenerSet;
use crate::dispatch::pending::PendingTable;
use crate::obs::KioskMetrics;
use crate::transport::codec::Inbound;

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Push message handed to this many message listeners.
    Delivered(usize),
    /// Camera frame handed to this many frame listeners.
    Frame(usize),
    /// Response matched a pending request.
    Resolved,
    /// Response with no pending request (late, duplicate or unknown id).
    Orphaned,
    /// Name outside the channel vocabulary.
    Unknown,
    /// Malformed payload, or a frame on a channel without a frame tag.
    Dropped,
}

#[derive(Deserialize)]
struct Correlated {
    request_id: String,
}

pub struct Router<V: Vocabulary> {
    messages: ListenerSet<Envelope<V::Message>>,
    frames: ListenerSet<CameraFrame>,
    pending: Arc<PendingTable>,
    metrics: Arc<KioskMetrics>,
}

impl<V: Vocabulary> Router<V> {
    pub fn new(pending: Arc<PendingTable>, metrics: Arc<KioskMetrics>) -> Self {
        Self {
            messages: ListenerSet::new(V::CHANNEL),
            frames: ListenerSet::new(V::CHANNEL),
            pending,
            metrics,
        }
    }

    pub fn messages(&self) -> &ListenerSet<Envelope<V::Message>> {
        &self.messages
    }

    pub fn frames(&self) -> &ListenerSet<CameraFrame> {
        &self.frames
    }

    pub fn route(&self, inbound: Inbound) -> Routed {
        match inbound {
            Inbound::Envelope(env) => self.route_envelope(env),
            Inbound::Frame(frame) => self.route_frame(frame),
            Inbound::Ping(_) | Inbound::Pong(_) | Inbound::Close(_) => Routed::Dropped,
        }
    }

    pub fn route_envelope(&self, env: WireEnvelope) -> Routed {
        let name = env.name().to_string();

        if V::FRAME_NAME == Some(name.as_str()) {
            return match decode_json_frame(env) {
                Ok(frame) => self.emit_frame(frame),
                Err(e) => self.decode_failed(&name, &e.to_string()),
            };
        }

        if V::is_response(&name) {
            return self.resolve(&name, env);
        }

        match V::decode(&name, env.data()) {
            Ok(Some(data)) => {
                self.count_inbound("message");
                trace!(channel = V::CHANNEL, name = %name, "message");
                let env = Envelope {
                    header: env.header,
                    data,
                };
                Routed::Delivered(self.messages.emit(&env))
            }
            Ok(None) => {
                warn!(channel = V::CHANNEL, name = %name, "unknown message, dropped");
                self.count_dropped("unknown");
                Routed::Unknown
            }
            Err(e) => self.decode_failed(&name, &e.to_string()),
        }
    }

    pub fn route_frame(&self, frame: CameraFrame) -> Routed {
        match V::FRAME_NAME {
            Some(tag) if frame.header.name == tag => self.emit_frame(frame),
            _ => {
                warn!(
                    channel = V::CHANNEL,
                    name = %frame.header.name,
                    "camera frame not expected on this channel, dropped"
                );
                self.count_dropped("frame");
                Routed::Dropped
            }
        }
    }

    fn emit_frame(&self, frame: CameraFrame) -> Routed {
        self.count_inbound("frame");
        trace!(channel = V::CHANNEL, bytes = frame.pixels.bytes().len(), "camera frame");
        Routed::Frame(self.frames.emit(&frame))
    }

    fn resolve(&self, name: &str, env: WireEnvelope) -> Routed {
        let request_id = match payload::<Correlated>(name, env.data()) {
            Ok(c) => c.request_id,
            Err(e) => {
                warn!(channel = V::CHANNEL, name, error = %e, "response without request_id, dropped");
                self.count_dropped("orphan");
                return Routed::Orphaned;
            }
        };

        let Some(data) = env.data else {
            return Routed::Orphaned;
        };

        self.count_inbound("response");
        if self.pending.resolve(&request_id, data) {
            trace!(channel = V::CHANNEL, name, request_id = %request_id, "response resolved");
            Routed::Resolved
        } else {
            warn!(
                channel = V::CHANNEL,
                name,
                request_id = %request_id,
                "no pending request for response, dropped"
            );
            self.count_dropped("orphan");
            Routed::Orphaned
        }
    }

    fn decode_failed(&self, name: &str, error: &str) -> Routed {
        warn!(channel = V::CHANNEL, name, error, "malformed payload, dropped");
        self.metrics
            .decode_errors
            .inc(&[("channel", V::CHANNEL)]);
        self.count_dropped("malformed");
        Routed::Dropped
    }

    fn count_inbound(&self, kind: &str) {
        self.metrics
            .inbound
            .inc(&[("channel", V::CHANNEL), ("kind", kind)]);
    }

    fn count_dropped(&self, reason: &str) {
        self.metrics
            .dropped
            .inc(&[("channel", V::CHANNEL), ("reason", reason)]);
    }
}
