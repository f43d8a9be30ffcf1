//! Decode-once codec.
//!
//! - Text frames => `WireEnvelope` (lazy `RawValue` for data)
//! - Binary frames starting with `{` => the same JSON envelope, UTF-8 decoded
//! - Other binary frames => camera frame on the binary lane, when enabled
//! - Ping/Pong/Close are surfaced for lifecycle management

use bytes::Bytes;

use kiosklink_core::error::{KioskError, Result};
use kiosklink_core::protocol::envelope::{decode_envelope, WireEnvelope};
use kiosklink_core::protocol::frame::{decode_camera_frame, CameraFrame};

use super::{CloseFrame, WsFrame};

#[derive(Debug)]
pub enum Inbound {
    Envelope(WireEnvelope),
    Frame(CameraFrame),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<CloseFrame>),
}

pub fn decode(frame: WsFrame, binary_lane: bool) -> Result<Inbound> {
    match frame {
        WsFrame::Text(s) => Ok(Inbound::Envelope(decode_envelope(&s)?)),
        WsFrame::Binary(b) => {
            if looks_like_json(&b) {
                let s = std::str::from_utf8(&b)
                    .map_err(|e| KioskError::Decode(format!("binary json is not utf-8: {e}")))?;
                return Ok(Inbound::Envelope(decode_envelope(s)?));
            }
            if !binary_lane {
                return Err(KioskError::Decode("binary camera frames are disabled".into()));
            }
            Ok(Inbound::Frame(decode_camera_frame(b)?))
        }
        WsFrame::Ping(b) => Ok(Inbound::Ping(b)),
        WsFrame::Pong(b) => Ok(Inbound::Pong(b)),
        WsFrame::Close(c) => Ok(Inbound::Close(c)),
    }
}

fn looks_like_json(b: &[u8]) -> bool {
    b.iter()
        .find(|c| !c.is_ascii_whitespace())
        .is_some_and(|c| *c == b'{')
}
