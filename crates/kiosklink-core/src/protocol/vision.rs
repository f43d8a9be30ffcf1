//! Vision channel vocabulary: pose and QR streams, game lifecycle, and the
//! hand-gesture request/response pair.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::Result;
use crate::protocol::backend::GameSignal;
use crate::protocol::names::vision as names;
use crate::protocol::vocabulary::{payload, Vocabulary};

/// `HEADPOSE` payload (streaming).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadPose {
    pub yaw: f64,
    pub pitch: f64,
    /// Derived progress fraction, when the perception side computes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

/// `QR_ROI` payload: region of interest in normalized frame coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrRoi {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// `QR_SCANNED` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrScanned {
    pub code: String,
}

/// `ERROR` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisionError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// `ACK` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ack {
    /// Name of the acknowledged message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub of: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `SET_SCENE` mirror sent to the perception service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneNotice {
    pub scene: String,
}

/// `REQ_HAND_GESTURE` payload. `request_id` lives in the payload, distinct
/// from the envelope header id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandGestureRequest {
    pub request_id: String,
}

/// Detected gesture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HandGesture {
    Rock,
    Paper,
    Scissors,
    /// No hand / nothing recognized.
    None,
    Other(String),
}

impl From<String> for HandGesture {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "ROCK" => HandGesture::Rock,
            "PAPER" => HandGesture::Paper,
            "SCISSORS" => HandGesture::Scissors,
            "NONE" | "" => HandGesture::None,
            _ => HandGesture::Other(s),
        }
    }
}

impl From<HandGesture> for String {
    fn from(g: HandGesture) -> Self {
        match g {
            HandGesture::Rock => "ROCK".into(),
            HandGesture::Paper => "PAPER".into(),
            HandGesture::Scissors => "SCISSORS".into(),
            HandGesture::None => "NONE".into(),
            HandGesture::Other(s) => s,
        }
    }
}

/// `RES_HAND_GESTURE` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandGestureResponse {
    pub request_id: String,
    pub gesture: HandGesture,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// Typed inbound push messages on the vision channel.
#[derive(Debug, Clone, PartialEq)]
pub enum VisionMessage {
    GameStart(GameSignal),
    GameStop(GameSignal),
    HeadPose(HeadPose),
    QrRoi(QrRoi),
    QrScanned(QrScanned),
    Error(VisionError),
    Ack(Ack),
}

/// Vision channel marker.
#[derive(Debug, Clone, Copy)]
pub struct Vision;

impl Vocabulary for Vision {
    type Message = VisionMessage;

    const CHANNEL: &'static str = "vision";

    fn is_response(name: &str) -> bool {
        name == names::RES_HAND_GESTURE
    }

    fn decode(name: &str, data: Option<&RawValue>) -> Result<Option<VisionMessage>> {
        let msg = match name {
            names::GAME_START => VisionMessage::GameStart(payload(name, data)?),
            names::GAME_STOP => VisionMessage::GameStop(payload(name, data)?),
            names::HEADPOSE => VisionMessage::HeadPose(payload(name, data)?),
            names::QR_ROI => VisionMessage::QrRoi(payload(name, data)?),
            names::QR_SCANNED => VisionMessage::QrScanned(payload(name, data)?),
            names::ERROR => VisionMessage::Error(payload(name, data)?),
            names::ACK => VisionMessage::Ack(payload(name, data)?),
            _ => return Ok(None),
        };
        Ok(Some(msg))
    }
}
