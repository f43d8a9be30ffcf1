//! Id and clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock in milliseconds since the Unix epoch (0 if the clock is before it).
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Envelope header id.
pub fn message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Request id for request/response correlation: `{millis}-{random hex}`.
///
/// Only needs to be unique among requests pending at the same time on one
/// channel; the pending table re-draws on the (unlikely) collision.
pub fn request_id() -> String {
    format!("{}-{:08x}", now_millis(), rand::random::<u32>())
}
