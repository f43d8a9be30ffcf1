//! Kiosk config loader (strict parsing).

pub mod schema;

use std::fs;
use std::io::ErrorKind;

use kiosklink_core::error::{KioskError, Result};

pub use schema::{ChannelSection, KioskConfig, ReconnectSection, ReconnectStrategy};

/// Parse and validate a YAML document. No environment overrides.
pub fn load_from_str(s: &str) -> Result<KioskConfig> {
    let cfg = parse(s)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Read a config file, apply environment overrides, then validate.
pub fn load_from_file(path: &str) -> Result<KioskConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| KioskError::Config(format!("read config failed ({path}): {e}")))?;
    let mut cfg = parse(&s)?;
    cfg.apply_env_overrides(|k| std::env::var(k).ok());
    cfg.validate()?;
    Ok(cfg)
}

/// Like `load_from_file`, but a missing file yields the defaults (still
/// subject to environment overrides).
pub fn load_or_default(path: &str) -> Result<KioskConfig> {
    match fs::metadata(path) {
        Ok(_) => load_from_file(path),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(path, "config file not found, using defaults");
            let mut cfg = KioskConfig::default();
            cfg.apply_env_overrides(|k| std::env::var(k).ok());
            cfg.validate()?;
            Ok(cfg)
        }
        Err(e) => Err(KioskError::Config(format!("stat config failed ({path}): {e}"))),
    }
}

fn parse(s: &str) -> Result<KioskConfig> {
    serde_yaml::from_str(s).map_err(|e| KioskError::Config(format!("invalid yaml: {e}")))
}
