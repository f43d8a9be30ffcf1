//! tokio-tungstenite backed `Connector`.

use async_trait::async_trait;
use futures_util::{future, SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as TungCloseFrame;
use tokio_tungstenite::tungstenite::Message;

use kiosklink_core::error::{KioskError, Result};

use super::{CloseFrame, Connector, FrameReader, FrameWriter, WsFrame};

fn map_ws_error(context: &'static str, err: impl std::fmt::Display) -> KioskError {
    KioskError::Transport(format!("{context}: {err}"))
}

fn close_to_frame(frame: Option<TungCloseFrame>) -> Option<CloseFrame> {
    frame.map(|f| CloseFrame {
        code: u16::from(f.code),
        reason: f.reason.as_str().to_string(),
    })
}

fn frame_to_close(frame: CloseFrame) -> TungCloseFrame {
    TungCloseFrame {
        code: CloseCode::from(frame.code),
        reason: frame.reason.into(),
    }
}

/// `None` for raw frames, which tungstenite only yields while writing.
fn msg_to_frame(msg: Message) -> Option<WsFrame> {
    match msg {
        Message::Text(text) => Some(WsFrame::Text(text.as_str().to_string())),
        Message::Binary(bytes) => Some(WsFrame::Binary(bytes)),
        Message::Ping(bytes) => Some(WsFrame::Ping(bytes)),
        Message::Pong(bytes) => Some(WsFrame::Pong(bytes)),
        Message::Close(frame) => Some(WsFrame::Close(close_to_frame(frame))),
        Message::Frame(_) => None,
    }
}

fn frame_to_msg(frame: WsFrame) -> Message {
    match frame {
        WsFrame::Text(text) => Message::Text(text.into()),
        WsFrame::Binary(bytes) => Message::Binary(bytes),
        WsFrame::Ping(bytes) => Message::Ping(bytes),
        WsFrame::Pong(bytes) => Message::Pong(bytes),
        WsFrame::Close(frame) => Message::Close(frame.map(frame_to_close)),
    }
}

/// Plain `ws://` / `wss://` client sockets via `connect_async`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<(FrameReader, FrameWriter)> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| map_ws_error("connect", e))?;
        let (sink, stream) = ws.split();

        let reader = stream.filter_map(|item| {
            future::ready(match item {
                Ok(msg) => msg_to_frame(msg).map(Ok),
                Err(e) => Some(Err(map_ws_error("read", e))),
            })
        });

        let writer = sink
            .sink_map_err(|e| map_ws_error("write", e))
            .with(|frame: WsFrame| future::ready(Ok::<_, KioskError>(frame_to_msg(frame))));

        Ok((Box::pin(reader), Box::pin(writer)))
    }
}
