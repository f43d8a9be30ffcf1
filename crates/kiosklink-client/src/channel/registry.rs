//! Per-channel singleton registry.
//!
//! Owned by the composition root. Every accessor call returns a handle to
//! the same channel until that channel is released.

use std::sync::{Arc, Mutex, PoisonError};

use kiosklink_core::protocol::vocabulary::Vocabulary;
use kiosklink_core::protocol::{Backend, Vision};

use crate::channel::{BackendChannel, Channel, ChannelConfig, VisionChannel};
use crate::config::KioskConfig;
use crate::obs::KioskMetrics;
use crate::transport::Connector;

struct Slot<V: Vocabulary> {
    config: ChannelConfig,
    channel: Mutex<Option<Channel<V>>>,
}

impl<V: Vocabulary> Slot<V> {
    fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            channel: Mutex::new(None),
        }
    }

    fn get(&self, connector: &Arc<dyn Connector>, metrics: &Arc<KioskMetrics>) -> Channel<V> {
        self.channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert_with(|| {
                tracing::debug!(channel = V::CHANNEL, url = %self.config.url, "channel created");
                Channel::new(
                    self.config.clone(),
                    Arc::clone(connector),
                    Arc::clone(metrics),
                )
            })
            .clone()
    }

    fn release(&self) {
        let released = self
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(channel) = released {
            channel.disconnect();
        }
    }
}

pub struct ChannelRegistry {
    connector: Arc<dyn Connector>,
    metrics: Arc<KioskMetrics>,
    backend: Slot<Backend>,
    vision: Slot<Vision>,
}

impl ChannelRegistry {
    pub fn init(
        config: &KioskConfig,
        connector: Arc<dyn Connector>,
        metrics: Arc<KioskMetrics>,
    ) -> Self {
        Self {
            connector,
            metrics,
            backend: Slot::new(config.backend_channel()),
            vision: Slot::new(config.vision_channel()),
        }
    }

    pub fn backend(&self) -> BackendChannel {
        self.backend.get(&self.connector, &self.metrics)
    }

    pub fn vision(&self) -> VisionChannel {
        self.vision.get(&self.connector, &self.metrics)
    }

    /// Disconnect and forget the backend channel; the next `backend()` call
    /// builds a fresh one.
    pub fn release_backend(&self) {
        self.backend.release();
    }

    pub fn release_vision(&self) {
        self.vision.release();
    }

    pub fn dispose(&self) {
        self.release_backend();
        self.release_vision();
    }

    pub fn metrics(&self) -> &Arc<KioskMetrics> {
        &self.metrics
    }
}
