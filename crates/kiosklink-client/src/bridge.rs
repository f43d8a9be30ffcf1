//! Scene/state bridge.
//!
//! Consumes both channels and keeps one `KioskState` that the renderer
//! watches. Backend scene and game-lifecycle messages are mirrored to the
//! vision channel so the perception service follows the current context.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use kiosklink_core::protocol::backend::{BackendCommand, BackendMessage};
use kiosklink_core::protocol::vision::VisionMessage;

use crate::channel::{BackendChannel, VisionChannel};
use crate::dispatch::Subscription;

/// Everything the renderer needs to pick and draw the current scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KioskState {
    pub scene: Option<String>,
    pub scene_text: Option<String>,
    /// Game-result hint carried by the last scene change.
    pub result_hint: Option<String>,
    /// Always within 0..=1.
    pub progress: f64,
    pub progress_label: Option<String>,
    /// Set by `SYSTEM_ERROR`, cleared by the next scene change.
    pub system_error: Option<String>,
    pub game_active: bool,
    pub backend_connected: bool,
    /// Perception-dependent mechanics stay disabled while false.
    pub vision_connected: bool,
}

pub struct SceneBridge {
    backend: BackendChannel,
    state: Arc<watch::Sender<KioskState>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SceneBridge {
    pub fn attach(backend: &BackendChannel, vision: &VisionChannel) -> Self {
        let (tx, _) = watch::channel(KioskState::default());
        let state = Arc::new(tx);
        let mut subs = Vec::new();

        {
            let state = Arc::clone(&state);
            let vision = vision.clone();
            subs.push(backend.add_message_listener(move |env| {
                apply_backend(&state, &vision, &env.data);
            }));
        }
        {
            let state = Arc::clone(&state);
            subs.push(vision.add_message_listener(move |env| match &env.data {
                VisionMessage::GameStart(_) => set_game_active(&state, true),
                VisionMessage::GameStop(_) => set_game_active(&state, false),
                _ => {}
            }));
        }

        let s = Arc::clone(&state);
        subs.push(backend.on_connect(move || {
            s.send_modify(|st| st.backend_connected = true);
        }));
        let s = Arc::clone(&state);
        subs.push(backend.on_disconnect(move |_| {
            s.send_modify(|st| st.backend_connected = false);
        }));
        let s = Arc::clone(&state);
        subs.push(vision.on_connect(move || {
            s.send_modify(|st| st.vision_connected = true);
        }));
        let s = Arc::clone(&state);
        subs.push(vision.on_disconnect(move |_| {
            s.send_modify(|st| st.vision_connected = false);
        }));

        state.send_modify(|st| {
            st.backend_connected = backend.is_connected();
            st.vision_connected = vision.is_connected();
        });

        Self {
            backend: backend.clone(),
            state,
            subscriptions: Mutex::new(subs),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> KioskState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<KioskState> {
        self.state.subscribe()
    }

    /// The single completion callback minigames use. Sends `GAME_RESULT` on
    /// the backend channel; `false` if it is not open.
    pub fn report_game_result(&self, minigame: &str, result: &str, score: Option<u32>) -> bool {
        info!(minigame, result, ?score, "game result");
        self.backend.send(BackendCommand::GameResult {
            minigame: minigame.to_string(),
            result: result.to_string(),
            score,
        })
    }

    /// Remove every listener the bridge registered.
    pub fn detach(&self) {
        let subs = std::mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for sub in subs {
            sub.unsubscribe();
        }
    }
}

fn apply_backend(state: &watch::Sender<KioskState>, vision: &VisionChannel, msg: &BackendMessage) {
    match msg {
        BackendMessage::SetScene(s) => {
            debug!(scene = %s.scene, "scene change");
            state.send_modify(|st| {
                st.scene = Some(s.scene.clone());
                st.scene_text = s.text.clone();
                st.result_hint = s.result.clone();
                st.system_error = None;
            });
            vision.send_scene(&s.scene);
        }
        BackendMessage::ProgressUpdate(p) => {
            let progress = if p.progress.is_finite() {
                p.progress.clamp(0.0, 1.0)
            } else {
                0.0
            };
            state.send_modify(|st| {
                st.progress = progress;
                st.progress_label = p.label.clone();
            });
        }
        BackendMessage::SystemError(e) => {
            warn!(message = %e.message, "backend reported system error");
            state.send_modify(|st| st.system_error = Some(e.message.clone()));
        }
        BackendMessage::GameStart(g) => {
            set_game_active(state, true);
            vision.send_game_start(g);
        }
        BackendMessage::GameStop(g) => {
            set_game_active(state, false);
            vision.send_game_stop(g);
        }
    }
}

fn set_game_active(state: &watch::Sender<KioskState>, active: bool) {
    state.send_if_modified(|st| {
        let changed = st.game_active != active;
        st.game_active = active;
        changed
    });
}
