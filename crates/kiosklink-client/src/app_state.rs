//! Composition root.
//!
//! Builds the metrics registry, the channel registry and the consumers that
//! hang off both channels (scene bridge, camera feed). Returns `Result` so
//! `main` can report startup errors without panicking.

use std::sync::Arc;

use kiosklink_core::error::Result;

use crate::bridge::SceneBridge;
use crate::channel::{BackendChannel, ChannelRegistry, VisionChannel};
use crate::config::KioskConfig;
use crate::obs::KioskMetrics;
use crate::services::CameraFeed;
use crate::transport::Connector;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: KioskConfig,
    metrics: Arc<KioskMetrics>,
    registry: ChannelRegistry,
    bridge: SceneBridge,
    camera: CameraFeed,
}

impl AppState {
    pub fn new(cfg: KioskConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        cfg.validate()?;

        let metrics = Arc::new(KioskMetrics::default());
        let registry = ChannelRegistry::init(&cfg, connector, Arc::clone(&metrics));

        let backend = registry.backend();
        let vision = registry.vision();
        let bridge = SceneBridge::attach(&backend, &vision);
        let camera = CameraFeed::attach(&backend);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                metrics,
                registry,
                bridge,
                camera,
            }),
        })
    }

    /// Connect both channels. A failed first attempt is logged and left to
    /// the reconnect timer.
    pub async fn start(&self) {
        let backend = self.backend();
        let vision = self.vision();
        let (b, v) = tokio::join!(backend.connect(), vision.connect());
        if let Err(e) = b {
            tracing::warn!(channel = "backend", error = %e, "initial connect failed, retrying in background");
        }
        if let Err(e) = v {
            tracing::warn!(channel = "vision", error = %e, "initial connect failed, retrying in background");
        }
    }

    /// Detach consumers and close both channels.
    pub fn shutdown(&self) {
        self.inner.bridge.detach();
        self.inner.camera.detach();
        self.inner.registry.dispose();
    }

    pub fn cfg(&self) -> &KioskConfig {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> &Arc<KioskMetrics> {
        &self.inner.metrics
    }

    pub fn backend(&self) -> BackendChannel {
        self.inner.registry.backend()
    }

    pub fn vision(&self) -> VisionChannel {
        self.inner.registry.vision()
    }

    pub fn bridge(&self) -> &SceneBridge {
        &self.inner.bridge
    }

    pub fn camera(&self) -> &CameraFeed {
        &self.inner.camera
    }
}
