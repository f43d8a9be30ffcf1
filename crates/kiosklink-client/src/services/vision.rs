//! Vision channel commands, the hand-gesture call and narrow subscriptions.
//!
//! Each `on_*` helper registers one general message listener that filters
//! by message kind.

use serde_json::json;

use kiosklink_core::error::Result;
use kiosklink_core::protocol::backend::GameSignal;
use kiosklink_core::protocol::names::vision as names;
use kiosklink_core::protocol::vision::{
    HandGestureResponse, HeadPose, QrRoi, QrScanned, VisionError, VisionMessage,
};
use kiosklink_core::protocol::vocabulary::payload;

use crate::channel::VisionChannel;
use crate::dispatch::Subscription;

impl VisionChannel {
    /// Mirror the current scene to the perception service.
    pub fn send_scene(&self, scene: &str) -> bool {
        self.send_command(names::SET_SCENE, json!({ "scene": scene }))
    }

    pub fn send_game_start(&self, signal: &GameSignal) -> bool {
        self.send_command(names::GAME_START, game_payload(signal))
    }

    pub fn send_game_stop(&self, signal: &GameSignal) -> bool {
        self.send_command(names::GAME_STOP, game_payload(signal))
    }

    /// Ask the perception service for the current hand gesture.
    pub async fn request_hand_gesture(&self) -> Result<HandGestureResponse> {
        let raw = self.request(names::REQ_HAND_GESTURE, json!({})).await?;
        payload(names::RES_HAND_GESTURE, Some(&*raw))
    }

    pub fn on_game_start<F>(&self, f: F) -> Subscription
    where
        F: Fn(&GameSignal) + Send + Sync + 'static,
    {
        self.add_message_listener(move |env| {
            if let VisionMessage::GameStart(g) = &env.data {
                f(g);
            }
        })
    }

    pub fn on_game_stop<F>(&self, f: F) -> Subscription
    where
        F: Fn(&GameSignal) + Send + Sync + 'static,
    {
        self.add_message_listener(move |env| {
            if let VisionMessage::GameStop(g) = &env.data {
                f(g);
            }
        })
    }

    pub fn on_head_pose<F>(&self, f: F) -> Subscription
    where
        F: Fn(&HeadPose) + Send + Sync + 'static,
    {
        self.add_message_listener(move |env| {
            if let VisionMessage::HeadPose(p) = &env.data {
                f(p);
            }
        })
    }

    pub fn on_qr_roi<F>(&self, f: F) -> Subscription
    where
        F: Fn(&QrRoi) + Send + Sync + 'static,
    {
        self.add_message_listener(move |env| {
            if let VisionMessage::QrRoi(r) = &env.data {
                f(r);
            }
        })
    }

    pub fn on_qr_scanned<F>(&self, f: F) -> Subscription
    where
        F: Fn(&QrScanned) + Send + Sync + 'static,
    {
        self.add_message_listener(move |env| {
            if let VisionMessage::QrScanned(q) = &env.data {
                f(q);
            }
        })
    }

    pub fn on_vision_error<F>(&self, f: F) -> Subscription
    where
        F: Fn(&VisionError) + Send + Sync + 'static,
    {
        self.add_message_listener(move |env| {
            if let VisionMessage::Error(e) = &env.data {
                f(e);
            }
        })
    }
}

fn game_payload(signal: &GameSignal) -> serde_json::Value {
    match &signal.game {
        Some(game) => json!({ "game": game }),
        None => json!({}),
    }
}
