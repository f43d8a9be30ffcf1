//! Reconnect delay policy.
//!
//! The baseline is a fixed delay between attempts. Exponential backoff with
//! optional jitter is opt-in through configuration.

use std::time::Duration;

use rand::Rng;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectPolicy {
    /// Never reconnect on its own.
    Disabled,
    Fixed(Duration),
    Exponential {
        base: Duration,
        max: Duration,
        factor: f64,
        jitter: bool,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Fixed(DEFAULT_RECONNECT_DELAY)
    }
}

/// Per-channel backoff state. Reset whenever a socket opens.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    policy: ReconnectPolicy,
    current: Option<Duration>,
    attempt: u32,
}

impl Backoff {
    pub(crate) fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            current: None,
            attempt: 0,
        }
    }

    /// Delay before the next attempt, `None` when reconnection is disabled.
    pub(crate) fn next_delay(&mut self) -> Option<Duration> {
        let delay = match &self.policy {
            ReconnectPolicy::Disabled => return None,
            ReconnectPolicy::Fixed(d) => *d,
            ReconnectPolicy::Exponential {
                base,
                max,
                factor,
                jitter,
            } => {
                let factor = if factor.is_finite() && *factor >= 1.0 {
                    *factor
                } else {
                    2.0
                };
                let delay = self.current.unwrap_or(*base).min(*max);
                let scaled = delay.as_secs_f64() * factor;
                self.current = Some(if scaled >= max.as_secs_f64() {
                    *max
                } else {
                    Duration::from_secs_f64(scaled)
                });
                if *jitter {
                    jitter_delay(delay)
                } else {
                    delay
                }
            }
        };
        self.attempt = self.attempt.saturating_add(1);
        Some(delay)
    }

    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }

    pub(crate) fn reset(&mut self) {
        self.current = None;
        self.attempt = 0;
    }
}

/// Scale `base` by a random factor in `[0.5, 1.0]`.
pub fn jitter_delay(base: Duration) -> Duration {
    if base.is_zero() {
        return base;
    }

    let jitter: f64 = rand::thread_rng().gen_range(0.5..=1.0);
    let nanos = (base.as_nanos() as f64 * jitter) as u128;
    Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
}
