//! Backend channel vocabulary: scene control, progress, errors, game
//! lifecycle, plus the outbound UI-event commands.

use serde::{Deserialize, Serialize};
use serde_json::{json, value::RawValue, Value};

use crate::error::Result;
use crate::protocol::names::backend as names;
use crate::protocol::vocabulary::{payload, Vocabulary};

/// `SET_SCENE` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetScene {
    /// Target scene identifier.
    pub scene: String,
    /// Optional display text for the scene.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Optional game-result hint (e.g. shown on the gift-pickup scene).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// `PROGRESS_UPDATE` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Fraction in 0..=1 (not enforced on the wire).
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// `SYSTEM_ERROR` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemError {
    pub message: String,
}

/// `GAME_START` / `GAME_STOP` payload (both channels).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSignal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<String>,
}

/// Typed inbound push messages on the backend channel.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendMessage {
    SetScene(SetScene),
    ProgressUpdate(ProgressUpdate),
    SystemError(SystemError),
    GameStart(GameSignal),
    GameStop(GameSignal),
}

/// Backend channel marker.
#[derive(Debug, Clone, Copy)]
pub struct Backend;

impl Vocabulary for Backend {
    type Message = BackendMessage;

    const CHANNEL: &'static str = "backend";
    const FRAME_NAME: Option<&'static str> = Some(names::CAMERA_FRAME);

    fn decode(name: &str, data: Option<&RawValue>) -> Result<Option<BackendMessage>> {
        let msg = match name {
            names::SET_SCENE => BackendMessage::SetScene(payload(name, data)?),
            names::PROGRESS_UPDATE => BackendMessage::ProgressUpdate(payload(name, data)?),
            names::SYSTEM_ERROR => BackendMessage::SystemError(payload(name, data)?),
            names::GAME_START => BackendMessage::GameStart(payload(name, data)?),
            names::GAME_STOP => BackendMessage::GameStop(payload(name, data)?),
            _ => return Ok(None),
        };
        Ok(Some(msg))
    }
}

/// Outbound UI events, one per discrete kiosk interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    Start,
    Cancel,
    MinigameSelected { minigame: String },
    GameResult { minigame: String, result: String, score: Option<u32> },
    StyleSelected { style: String },
    /// Per-minigame auxiliary command (e.g. a shooter hit, a memory flip).
    MinigameEvent { minigame: String, event: String, detail: Value },
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::Start => names::START,
            BackendCommand::Cancel => names::CANCEL,
            BackendCommand::MinigameSelected { .. } => names::MINIGAME_SELECTED,
            BackendCommand::GameResult { .. } => names::GAME_RESULT,
            BackendCommand::StyleSelected { .. } => names::STYLE_SELECTED,
            BackendCommand::MinigameEvent { .. } => names::MINIGAME_EVENT,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            BackendCommand::Start | BackendCommand::Cancel => json!({}),
            BackendCommand::MinigameSelected { minigame } => json!({ "minigame": minigame }),
            BackendCommand::GameResult { minigame, result, score } => {
                let mut v = json!({ "minigame": minigame, "result": result });
                if let Some(score) = score {
                    v["score"] = json!(score);
                }
                v
            }
            BackendCommand::StyleSelected { style } => json!({ "style": style }),
            BackendCommand::MinigameEvent { minigame, event, detail } => {
                json!({ "minigame": minigame, "event": event, "detail": detail })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn raw(s: &str) -> Box<RawValue> {
        RawValue::from_string(s.to_string()).unwrap()
    }

    #[test]
    fn set_scene_narrows_payload() {
        let data = raw(r#"{"scene":"GIFT_PICKUP","text":"Enjoy","result":"WIN"}"#);
        let msg = Backend::decode(names::SET_SCENE, Some(&data)).unwrap().unwrap();
        assert_eq!(
            msg,
            BackendMessage::SetScene(SetScene {
                scene: "GIFT_PICKUP".into(),
                text: Some("Enjoy".into()),
                result: Some("WIN".into()),
            })
        );
    }

    #[test]
    fn game_start_without_data_decodes() {
        let msg = Backend::decode(names::GAME_START, None).unwrap().unwrap();
        assert_eq!(msg, BackendMessage::GameStart(GameSignal::default()));
    }

    #[test]
    fn unknown_name_is_none_and_bad_shape_is_error() {
        assert!(Backend::decode("WHATEVER", None).unwrap().is_none());
        let data = raw(r#"{"progress":"half"}"#);
        let err = Backend::decode(names::PROGRESS_UPDATE, Some(&data)).unwrap_err();
        assert_eq!(err.code().as_str(), "DECODE");
    }

    #[test]
    fn game_result_payload_omits_missing_score() {
        let cmd = BackendCommand::GameResult {
            minigame: "rps".into(),
            result: "WIN".into(),
            score: None,
        };
        assert_eq!(cmd.name(), "GAME_RESULT");
        assert_eq!(cmd.payload(), json!({ "minigame": "rps", "result": "WIN" }));
    }
}
