use std::time::Duration;

use serde::Deserialize;

use kiosklink_core::error::{KioskError, Result};

use crate::channel::reconnect::ReconnectPolicy;
use crate::channel::ChannelConfig;

pub const DEFAULT_BACKEND_URL: &str = "ws://127.0.0.1:8080";
pub const DEFAULT_VISION_URL: &str = "ws://localhost:9002";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KioskConfig {
    pub version: u32,

    #[serde(default)]
    pub backend: ChannelSection,

    #[serde(default)]
    pub vision: ChannelSection,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            version: 1,
            backend: ChannelSection::default(),
            vision: ChannelSection::default(),
        }
    }
}

impl KioskConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(KioskError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.backend.validate("backend")?;
        self.vision.validate("vision")?;
        Ok(())
    }

    /// Apply `KIOSK_BACKEND_URL` / `KIOSK_VISION_URL` through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("KIOSK_BACKEND_URL").filter(|u| !u.is_empty()) {
            self.backend.url = Some(url);
        }
        if let Some(url) = lookup("KIOSK_VISION_URL").filter(|u| !u.is_empty()) {
            self.vision.url = Some(url);
        }
    }

    pub fn backend_channel(&self) -> ChannelConfig {
        self.backend.to_channel(DEFAULT_BACKEND_URL)
    }

    pub fn vision_channel(&self) -> ChannelConfig {
        self.vision.to_channel(DEFAULT_VISION_URL)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelSection {
    /// Falls back to the channel's default endpoint.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_binary_frames")]
    pub binary_frames: bool,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub reconnect: ReconnectSection,
}

impl Default for ChannelSection {
    fn default() -> Self {
        Self {
            url: None,
            binary_frames: default_binary_frames(),
            request_timeout_ms: default_request_timeout_ms(),
            reconnect: ReconnectSection::default(),
        }
    }
}

impl ChannelSection {
    pub fn validate(&self, section: &str) -> Result<()> {
        if let Some(url) = &self.url {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(KioskError::Config(format!(
                    "{section}.url must start with ws:// or wss://"
                )));
            }
        }
        if !(100..=120000).contains(&self.request_timeout_ms) {
            return Err(KioskError::Config(format!(
                "{section}.request_timeout_ms must be between 100 and 120000"
            )));
        }
        self.reconnect.validate(section)
    }

    fn to_channel(&self, default_url: &str) -> ChannelConfig {
        ChannelConfig {
            url: self.url.clone().unwrap_or_else(|| default_url.to_string()),
            binary_frames: self.binary_frames,
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            reconnect: self.reconnect.to_policy(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectStrategy {
    #[default]
    Fixed,
    Exponential,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectSection {
    #[serde(default)]
    pub strategy: ReconnectStrategy,

    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Exponential only.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Exponential only.
    #[serde(default = "default_factor")]
    pub factor: f64,

    /// Exponential only.
    #[serde(default)]
    pub jitter: bool,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            strategy: ReconnectStrategy::default(),
            delay_ms: default_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            factor: default_factor(),
            jitter: false,
        }
    }
}

impl ReconnectSection {
    pub fn validate(&self, section: &str) -> Result<()> {
        if !(10..=600000).contains(&self.delay_ms) {
            return Err(KioskError::Config(format!(
                "{section}.reconnect.delay_ms must be between 10 and 600000"
            )));
        }
        if self.max_delay_ms < self.delay_ms {
            return Err(KioskError::Config(format!(
                "{section}.reconnect.max_delay_ms must not be less than delay_ms"
            )));
        }
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(KioskError::Config(format!(
                "{section}.reconnect.factor must be a finite number >= 1.0"
            )));
        }
        Ok(())
    }

    pub fn to_policy(&self) -> ReconnectPolicy {
        let delay = Duration::from_millis(self.delay_ms);
        match self.strategy {
            ReconnectStrategy::Fixed => ReconnectPolicy::Fixed(delay),
            ReconnectStrategy::Exponential => ReconnectPolicy::Exponential {
                base: delay,
                max: Duration::from_millis(self.max_delay_ms),
                factor: self.factor,
                jitter: self.jitter,
            },
            ReconnectStrategy::Disabled => ReconnectPolicy::Disabled,
        }
    }
}

fn default_binary_frames() -> bool {
    true
}
fn default_request_timeout_ms() -> u64 {
    10000
}
fn default_delay_ms() -> u64 {
    3000
}
fn default_max_delay_ms() -> u64 {
    30000
}
fn default_factor() -> f64 {
    2.0
}
