//! Camera frames (panic-free).
//!
//! Two encodings carry the same frame:
//! - JSON lane: an envelope whose `data` holds frame metadata plus the pixel
//!   bytes as base64 in `data.data`.
//! - Binary lane: `version:u8 | meta_len:u32 LE | meta JSON | pixel bytes`.
//!   The meta JSON is an envelope whose `data` holds the metadata only, so
//!   the pixel payload travels out-of-band of the JSON structure.
//!
//! Parsing rules:
//! - Never index (`buf[0]`): always use `Buf` and `remaining()` checks.
//! - Never `unwrap()` / `expect()` / `panic!()` in production paths.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{KioskError, Result};
use crate::protocol::envelope::{Header, WireEnvelope};
use crate::protocol::vocabulary::payload;

/// Binary lane version byte.
pub const FRAME_LANE_VERSION: u8 = 1;

/// Upper bound for the binary lane's JSON metadata block.
pub const MAX_META_LEN: usize = 64 * 1024;

/// Pixel format tag for raw buffers.
pub const RAW_FORMAT: &str = "raw";

/// Channels assumed for raw buffers when the producer does not say (RGBA).
pub const DEFAULT_CHANNELS: u8 = 4;

/// Frame metadata shared by both lanes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameMeta {
    /// `raw` (or absent) for raw pixel buffers, otherwise an image format tag
    /// such as `jpeg` or `png`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct JsonFrameData {
    #[serde(flatten)]
    meta: FrameMeta,
    data: String,
}

/// Pixel payload of a camera frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePixels {
    /// Raw pixel buffer, `width * height * channels` bytes.
    Raw {
        width: u32,
        height: u32,
        channels: u8,
        pixels: Bytes,
    },
    /// Encoded image blob.
    Encoded {
        format: String,
        width: Option<u32>,
        height: Option<u32>,
        bytes: Bytes,
    },
}

impl FramePixels {
    pub fn bytes(&self) -> &Bytes {
        match self {
            FramePixels::Raw { pixels, .. } => pixels,
            FramePixels::Encoded { bytes, .. } => bytes,
        }
    }

    fn meta(&self) -> FrameMeta {
        match self {
            FramePixels::Raw {
                width,
                height,
                channels,
                ..
            } => FrameMeta {
                format: Some(RAW_FORMAT.into()),
                width: Some(*width),
                height: Some(*height),
                channels: Some(*channels),
            },
            FramePixels::Encoded {
                format,
                width,
                height,
                ..
            } => FrameMeta {
                format: Some(format.clone()),
                width: *width,
                height: *height,
                channels: None,
            },
        }
    }
}

/// Decoded camera frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFrame {
    pub header: Header,
    pub pixels: FramePixels,
}

fn assemble(header: Header, meta: FrameMeta, bytes: Bytes) -> Result<CameraFrame> {
    let pixels = match meta.format.as_deref() {
        None | Some(RAW_FORMAT) => {
            let width = meta
                .width
                .ok_or_else(|| KioskError::Decode("raw frame requires width".into()))?;
            let height = meta
                .height
                .ok_or_else(|| KioskError::Decode("raw frame requires height".into()))?;
            let channels = meta.channels.unwrap_or(DEFAULT_CHANNELS);
            let expected = (width as usize)
                .checked_mul(height as usize)
                .and_then(|n| n.checked_mul(channels as usize))
                .ok_or_else(|| KioskError::Decode("raw frame dimensions overflow".into()))?;
            if bytes.len() != expected {
                return Err(KioskError::Decode(format!(
                    "raw frame expects {expected} bytes, got {}",
                    bytes.len()
                )));
            }
            FramePixels::Raw {
                width,
                height,
                channels,
                pixels: bytes,
            }
        }
        Some(format) => FramePixels::Encoded {
            format: format.to_string(),
            width: meta.width,
            height: meta.height,
            bytes,
        },
    };
    Ok(CameraFrame { header, pixels })
}

/// Decode the JSON lane form from an already-parsed envelope.
pub fn decode_json_frame(env: WireEnvelope) -> Result<CameraFrame> {
    let data: JsonFrameData = payload(env.name(), env.data())?;
    let bytes = STANDARD
        .decode(data.data.as_bytes())
        .map_err(|e| KioskError::Decode(format!("camera frame base64: {e}")))?;
    assemble(env.header, data.meta, Bytes::from(bytes))
}

/// Decode a binary lane frame.
pub fn decode_camera_frame(mut buf: Bytes) -> Result<CameraFrame> {
    // Minimum header: version + meta_len
    if buf.remaining() < 5 {
        return Err(KioskError::Decode("camera frame too short".into()));
    }

    let v = buf.get_u8();
    if v != FRAME_LANE_VERSION {
        return Err(KioskError::UnsupportedVersion);
    }

    let meta_len = buf.get_u32_le() as usize;
    if meta_len > MAX_META_LEN {
        return Err(KioskError::Decode("camera frame meta too large".into()));
    }
    if buf.remaining() < meta_len {
        return Err(KioskError::Decode(
            "camera frame meta length exceeds frame".into(),
        ));
    }

    let meta_bytes = buf.split_to(meta_len);
    let env: WireEnvelope = serde_json::from_slice(&meta_bytes)
        .map_err(|e| KioskError::Decode(format!("camera frame meta json: {e}")))?;
    let meta: FrameMeta = payload(env.name(), env.data())?;

    // Remaining bytes are pixels (zero-copy).
    assemble(env.header, meta, buf)
}

/// Encode a frame for the binary lane.
pub fn encode_camera_frame(header: &Header, pixels: &FramePixels) -> Result<Bytes> {
    let meta = serde_json::to_vec(&json!({ "header": header, "data": pixels.meta() }))
        .map_err(|e| KioskError::Internal(format!("camera frame meta encode: {e}")))?;
    let meta_len = u32::try_from(meta.len())
        .map_err(|_| KioskError::Internal("camera frame meta too large".into()))?;

    let body = pixels.bytes();
    let mut out = BytesMut::with_capacity(5 + meta.len() + body.len());
    out.put_u8(FRAME_LANE_VERSION);
    out.put_u32_le(meta_len);
    out.put_slice(&meta);
    out.put_slice(body);
    Ok(out.freeze())
}

/// Encode a frame as a JSON lane envelope.
pub fn encode_json_frame(header: &Header, pixels: &FramePixels) -> Result<String> {
    let mut data = serde_json::to_value(pixels.meta())
        .map_err(|e| KioskError::Internal(format!("camera frame meta encode: {e}")))?;
    data["data"] = json!(STANDARD.encode(pixels.bytes()));
    serde_json::to_string(&json!({ "header": header, "data": data }))
        .map_err(|e| KioskError::Internal(format!("camera frame encode: {e}")))
}
