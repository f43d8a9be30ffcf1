//! Transport layer: socket-level frames, the `Connector` seam and the
//! decode-once codec.
//!
//! The channel runtime never touches tokio-tungstenite types directly; it
//! talks to a boxed reader/writer pair produced by a `Connector`, which keeps
//! the in-memory mock transport and the real socket interchangeable.

pub mod codec;
pub mod tungstenite;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Sink, Stream};

use kiosklink_core::error::{KioskError, Result};

pub use tungstenite::TungsteniteConnector;

/// Close code for a deliberate shutdown. No reconnect follows it.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the socket went away without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

impl CloseFrame {
    pub fn normal() -> Self {
        Self {
            code: NORMAL_CLOSURE,
            reason: String::new(),
        }
    }
}

/// One WebSocket frame, independent of the socket implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsFrame {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<CloseFrame>),
}

/// Inbound half of an open socket.
pub type FrameReader = Pin<Box<dyn Stream<Item = Result<WsFrame>> + Send>>;

/// Outbound half of an open socket.
pub type FrameWriter = Pin<Box<dyn Sink<WsFrame, Error = KioskError> + Send>>;

/// Opens sockets. One implementation per transport; shared by every channel.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<(FrameReader, FrameWriter)>;
}
