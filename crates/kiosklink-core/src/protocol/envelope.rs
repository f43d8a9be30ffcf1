//! Message envelope (JSON).
//!
//! Inbound envelopes keep `data` as `RawValue` so the router can match on
//! `header.name` first and parse the payload exactly once, into the type the
//! name dictates.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{KioskError, Result};
use crate::protocol::id;

/// Which side produced a message. Provenance only, never trust.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Sender {
    Frontend,
    Backend,
    Vision,
    /// Anything else a peer puts on the wire.
    Other(String),
}

impl Default for Sender {
    fn default() -> Self {
        Sender::Other(String::new())
    }
}

impl From<String> for Sender {
    fn from(s: String) -> Self {
        match s.as_str() {
            "FRONTEND" => Sender::Frontend,
            "BACKEND" => Sender::Backend,
            "VISION" => Sender::Vision,
            _ => Sender::Other(s),
        }
    }
}

impl From<Sender> for String {
    fn from(s: Sender) -> Self {
        match s {
            Sender::Frontend => "FRONTEND".into(),
            Sender::Backend => "BACKEND".into(),
            Sender::Vision => "VISION".into(),
            Sender::Other(s) => s,
        }
    }
}

/// Envelope header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Per-message id (tracing only, never used for correlation).
    #[serde(default)]
    pub id: String,
    /// Message name from the channel vocabulary.
    pub name: String,
    #[serde(default)]
    pub sender: Sender,
    /// Producer wall clock, milliseconds since the Unix epoch. Advisory.
    #[serde(default)]
    pub timestamp: u64,
}

impl Header {
    /// Header for a message produced by this kiosk.
    pub fn outbound(name: impl Into<String>) -> Self {
        Self {
            id: id::message_id(),
            name: name.into(),
            sender: Sender::Frontend,
            timestamp: id::now_millis(),
        }
    }
}

/// Header + payload. Consumers only ever see `&Envelope`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<D> {
    pub header: Header,
    pub data: D,
}

impl<D> Envelope<D> {
    pub fn name(&self) -> &str {
        &self.header.name
    }
}

impl<D: Serialize> Envelope<D> {
    /// Build an outbound envelope, auto-filling id, sender and timestamp.
    pub fn outbound(name: impl Into<String>, data: D) -> Self {
        Self {
            header: Header::outbound(name),
            data,
        }
    }

    /// Encode as one self-contained JSON document.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| KioskError::Internal(format!("envelope encode failed: {e}")))
    }
}

/// Inbound envelope as decoded off the wire: header parsed, payload raw.
#[derive(Debug, Deserialize)]
pub struct WireEnvelope {
    pub header: Header,
    #[serde(default)]
    pub data: Option<Box<RawValue>>,
}

impl WireEnvelope {
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Raw payload, if any.
    pub fn data(&self) -> Option<&RawValue> {
        self.data.as_deref()
    }
}

/// Decode a JSON text frame into a wire envelope.
pub fn decode_envelope(s: &str) -> Result<WireEnvelope> {
    serde_json::from_str(s).map_err(|e| KioskError::Decode(format!("invalid envelope json: {e}")))
}
