//! Pending request table.
//!
//! Every terminal path (response, expiry, connection loss) starts by
//! removing the entry from the map. `DashMap::remove` is atomic, so exactly
//! one of them wins and a request is never settled twice.

use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use serde_json::value::RawValue;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use kiosklink_core::error::{KioskError, Result};
use kiosklink_core::protocol::id;

use crate::obs::KioskMetrics;

/// Raw response payload, interpreted by the caller.
pub type Response = Box<RawValue>;

struct Entry {
    tx: oneshot::Sender<Result<Response>>,
    timer: Option<JoinHandle<()>>,
    started: Instant,
}

pub struct PendingTable {
    channel: &'static str,
    map: DashMap<String, Entry>,
    metrics: Arc<KioskMetrics>,
}

impl PendingTable {
    pub fn new(channel: &'static str, metrics: Arc<KioskMetrics>) -> Self {
        Self {
            channel,
            map: DashMap::new(),
            metrics,
        }
    }

    /// Register a new request under a fresh id. Ids that collide with a
    /// still-pending request are re-drawn.
    pub fn register(&self) -> (String, oneshot::Receiver<Result<Response>>) {
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        loop {
            let request_id = id::request_id();
            if let MapEntry::Vacant(slot) = self.map.entry(request_id.clone()) {
                if let Some(tx) = tx.take() {
                    slot.insert(Entry {
                        tx,
                        timer: None,
                        started: Instant::now(),
                    });
                }
                self.metrics
                    .pending_requests
                    .inc(&[("channel", self.channel)]);
                return (request_id, rx);
            }
        }
    }

    /// Attach the expiry timer. If the request already settled, the timer is
    /// aborted right away.
    pub fn arm_timer(&self, request_id: &str, timer: JoinHandle<()>) {
        match self.map.get_mut(request_id) {
            Some(mut entry) => entry.timer = Some(timer),
            None => timer.abort(),
        }
    }

    /// Fulfill with a response. `false` if nothing was pending under the id
    /// (late, duplicate or unknown response).
    pub fn resolve(&self, request_id: &str, response: Response) -> bool {
        self.settle(request_id, Ok(response), "resolved", true)
    }

    /// Fail with `Timeout`. Called by the expiry timer itself.
    pub fn expire(&self, request_id: &str) -> bool {
        self.settle(request_id, Err(KioskError::Timeout), "timeout", false)
    }

    /// Fail one request with `err`.
    pub fn reject(&self, request_id: &str, err: KioskError, outcome: &'static str) -> bool {
        self.settle(request_id, Err(err), outcome, true)
    }

    /// Fail every pending request with `err`. Returns how many were failed.
    pub fn drain(&self, err: KioskError) -> usize {
        let ids: Vec<String> = self.map.iter().map(|e| e.key().clone()).collect();
        ids.into_iter()
            .filter(|id| self.reject(id, err.clone(), "closed"))
            .count()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.map.contains_key(request_id)
    }

    fn settle(
        &self,
        request_id: &str,
        outcome: Result<Response>,
        label: &'static str,
        abort_timer: bool,
    ) -> bool {
        let Some((_, entry)) = self.map.remove(request_id) else {
            return false;
        };
        if abort_timer {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
        }

        let labels = [("channel", self.channel)];
        self.metrics.pending_requests.dec(&labels);
        self.metrics
            .requests
            .inc(&[("channel", self.channel), ("outcome", label)]);
        self.metrics
            .request_duration
            .observe(&labels, entry.started.elapsed());

        // The caller may have dropped its future; nothing left to notify.
        let _ = entry.tx.send(outcome);
        true
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn raw(s: &str) -> Response {
        RawValue::from_string(s.to_string()).unwrap()
    }

    fn table() -> PendingTable {
        PendingTable::new("vision", Arc::new(KioskMetrics::default()))
    }

    #[tokio::test]
    async fn first_terminal_path_wins() {
        let t = table();
        let (id, rx) = t.register();

        assert!(t.resolve(&id, raw(r#"{"gesture":"ROCK"}"#)));
        assert!(!t.expire(&id));
        assert!(!t.resolve(&id, raw("{}")));
        assert_eq!(t.drain(KioskError::ConnectionClosed), 0);

        let got = rx.await.unwrap().unwrap();
        assert_eq!(got.get(), r#"{"gesture":"ROCK"}"#);
        assert!(t.is_empty());
    }

    #[tokio::test]
    async fn drain_rejects_everything_with_the_given_error() {
        let t = table();
        let (_a, rx_a) = t.register();
        let (_b, rx_b) = t.register();

        assert_eq!(t.drain(KioskError::ConnectionClosed), 2);
        assert_eq!(rx_a.await.unwrap().unwrap_err(), KioskError::ConnectionClosed);
        assert_eq!(rx_b.await.unwrap().unwrap_err(), KioskError::ConnectionClosed);
        assert_eq!(t.len(), 0);
        assert_eq!(
            t.metrics.requests.get(&[("channel", "vision"), ("outcome", "closed")]),
            2
        );
        assert_eq!(t.metrics.pending_requests.get(&[("channel", "vision")]), 0);
    }

    #[tokio::test]
    async fn timer_armed_after_resolution_is_aborted() {
        let t = table();
        let (id, _rx) = t.register();
        assert!(t.resolve(&id, raw("{}")));

        let timer = tokio::spawn(std::future::pending::<()>());
        t.arm_timer(&id, timer);
        assert!(!t.contains(&id));
    }
}
