//! Ordered listener lists with removable registrations.
//!
//! Emission iterates a snapshot taken under the lock, so a listener may add
//! or remove registrations (including its own) while a pass is running. A
//! panicking listener is logged and skipped; the rest of the pass continues.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

struct Inner<T> {
    label: &'static str,
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Listener<T>)>>,
}

impl<T: 'static> Detach for Inner<T> {
    fn detach(&self, id: u64) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(eid, _)| *eid != id);
    }
}

pub struct ListenerSet<T> {
    inner: Arc<Inner<T>>,
}

impl<T: 'static> ListenerSet<T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            inner: Arc::new(Inner {
                label,
                next_id: AtomicU64::new(1),
                entries: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a listener. It runs after every listener registered before it.
    pub fn add<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(f)));

        let target: Weak<dyn Detach> = Arc::downgrade(&self.inner) as Weak<dyn Detach>;
        Subscription {
            target: Some(target),
            id,
        }
    }

    /// Invoke every registered listener with `value`. Returns how many ran
    /// to completion.
    pub fn emit(&self, value: &T) -> usize {
        let snapshot: Vec<Listener<T>> = self
            .inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        let mut completed = 0;
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| (*listener)(value))) {
                Ok(()) => completed += 1,
                Err(_) => tracing::error!(listeners = self.inner.label, "listener panicked"),
            }
        }
        completed
    }

    pub fn len(&self) -> usize {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Handle to one listener registration.
///
/// `unsubscribe` removes exactly that registration. It is idempotent and
/// harmless once the owning list is gone. Dropping the handle keeps the
/// listener registered.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    target: Option<Weak<dyn Detach>>,
    id: u64,
}

impl Subscription {
    /// A subscription attached to nothing.
    pub fn detached() -> Self {
        Self { target: None, id: 0 }
    }

    pub fn unsubscribe(&self) {
        if let Some(target) = self.target.as_ref().and_then(Weak::upgrade) {
            target.detach(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
