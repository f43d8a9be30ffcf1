//! Camera feed: the consumer of the backend frame fanout.
//!
//! Keeps only the latest frame. Frames are shared behind `Arc` so the
//! renderer can hold one without copying pixel data.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use kiosklink_core::protocol::frame::CameraFrame;

use crate::channel::BackendChannel;
use crate::dispatch::Subscription;

struct FeedShared {
    latest: watch::Sender<Option<Arc<CameraFrame>>>,
    frames: AtomicU64,
}

pub struct CameraFeed {
    shared: Arc<FeedShared>,
    subscription: Subscription,
}

impl CameraFeed {
    pub fn attach(channel: &BackendChannel) -> Self {
        let (latest, _) = watch::channel(None);
        let shared = Arc::new(FeedShared {
            latest,
            frames: AtomicU64::new(0),
        });

        let feed = Arc::clone(&shared);
        let subscription = channel.add_frame_listener(move |frame| {
            feed.frames.fetch_add(1, Ordering::Relaxed);
            feed.latest.send_replace(Some(Arc::new(frame.clone())));
        });

        Self {
            shared,
            subscription,
        }
    }

    pub fn latest(&self) -> Option<Arc<CameraFrame>> {
        self.shared.latest.borrow().clone()
    }

    /// Watch for new frames. Slow receivers skip straight to the newest one.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<CameraFrame>>> {
        self.shared.latest.subscribe()
    }

    pub fn frames_received(&self) -> u64 {
        self.shared.frames.load(Ordering::Relaxed)
    }

    /// Stop receiving frames. The last frame stays available.
    pub fn detach(&self) {
        self.subscription.unsubscribe();
    }
}
