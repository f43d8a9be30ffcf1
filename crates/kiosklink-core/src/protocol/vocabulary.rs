//! Per-channel vocabulary: the tag check happens once, in the router, and
//! consumers receive an already-narrowed payload type.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

use crate::error::{KioskError, Result};

pub trait Vocabulary: Send + Sync + 'static {
    /// Typed push messages of this channel.
    type Message: Debug + Send + Sync + 'static;

    /// Channel label used in logs and metrics.
    const CHANNEL: &'static str;

    /// Reserved high-frequency frame tag, if the channel carries camera frames.
    const FRAME_NAME: Option<&'static str> = None;

    /// Whether `name` is the response half of a request/response pair.
    fn is_response(_name: &str) -> bool {
        false
    }

    /// Narrow a payload by name.
    ///
    /// `Ok(None)` means the name is outside the vocabulary; `Err` means the
    /// name is known but the payload does not have the shape it dictates.
    fn decode(name: &str, data: Option<&RawValue>) -> Result<Option<Self::Message>>;
}

/// Deserialize a named payload. An absent payload reads as `{}` so signal-only
/// messages (all fields optional) decode without data.
pub fn payload<T: DeserializeOwned>(name: &str, data: Option<&RawValue>) -> Result<T> {
    let raw = data.map(RawValue::get).unwrap_or("{}");
    serde_json::from_str(raw).map_err(|e| KioskError::Decode(format!("{name}: invalid data: {e}")))
}
