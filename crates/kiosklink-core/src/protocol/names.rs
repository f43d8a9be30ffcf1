//! Message-name taxonomy. Each channel has a closed vocabulary; anything else
//! is logged and dropped by the router.

/// Backend channel (kiosk <-> orchestrating authority).
pub mod backend {
    // inbound
    pub const SET_SCENE: &str = "SET_SCENE";
    pub const PROGRESS_UPDATE: &str = "PROGRESS_UPDATE";
    pub const SYSTEM_ERROR: &str = "SYSTEM_ERROR";
    pub const GAME_START: &str = "GAME_START";
    pub const GAME_STOP: &str = "GAME_STOP";
    /// Reserved high-rate tag, routed to frame listeners only.
    pub const CAMERA_FRAME: &str = "CAMERA_FRAME";

    // outbound
    pub const START: &str = "START";
    pub const CANCEL: &str = "CANCEL";
    pub const MINIGAME_SELECTED: &str = "MINIGAME_SELECTED";
    pub const GAME_RESULT: &str = "GAME_RESULT";
    pub const STYLE_SELECTED: &str = "STYLE_SELECTED";
    pub const MINIGAME_EVENT: &str = "MINIGAME_EVENT";
}

/// Vision channel (kiosk <-> perception service).
pub mod vision {
    pub const SET_SCENE: &str = "SET_SCENE";
    pub const GAME_START: &str = "GAME_START";
    pub const GAME_STOP: &str = "GAME_STOP";
    pub const REQ_HAND_GESTURE: &str = "REQ_HAND_GESTURE";
    pub const RES_HAND_GESTURE: &str = "RES_HAND_GESTURE";
    pub const HEADPOSE: &str = "HEADPOSE";
    pub const QR_ROI: &str = "QR_ROI";
    pub const QR_SCANNED: &str = "QR_SCANNED";
    pub const ERROR: &str = "ERROR";
    pub const ACK: &str = "ACK";
}
