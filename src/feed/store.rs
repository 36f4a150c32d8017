//! # Bounded, thread-safe activity feed.
//!
//! [`EventFeed`] keeps the most recent [`FeedEvent`]s, newest first. It is the
//! single synchronization point between producers (sources, the supervisor's
//! `FeedRecorder`) and consumers (the exporter, the `feed` command).
//!
//! ## Rules
//! - `len() <= capacity()` at all times; the oldest entry is dropped on overflow.
//! - Every composite operation runs under one mutex, so a concurrent
//!   `record` is either fully visible to `recent` or not at all.
//! - The handle is cheap to clone and is injected into producers and consumers.
//!
//! ```text
//!  record(e3) ──► [ e3 | e2 | e1 | ... | eN ] ──► eN+1 evicted
//!                   ▲ newest            oldest
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use super::FeedEvent;

/// Default number of events kept.
pub const DEFAULT_FEED_CAPACITY: usize = 200;

struct Inner {
    capacity: usize,
    events: Mutex<Ring>,
}

struct Ring {
    buf: VecDeque<FeedEvent>,
    recorded: u64,
}

/// Shared handle to a bounded newest-first event buffer.
#[derive(Clone)]
pub struct EventFeed {
    inner: Arc<Inner>,
}

impl EventFeed {
    /// Creates a feed holding at most `capacity` events (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Inner {
                capacity,
                events: Mutex::new(Ring {
                    buf: VecDeque::with_capacity(capacity + 1),
                    recorded: 0,
                }),
            }),
        }
    }

    /// Inserts `event` at the front, evicting the oldest entry when full.
    pub fn record(&self, event: FeedEvent) {
        let mut ring = self.inner.events.lock();
        ring.buf.push_front(event);
        if ring.buf.len() > self.inner.capacity {
            ring.buf.pop_back();
        }
        ring.recorded += 1;
    }

    /// Records a freshly stamped event.
    pub fn push(
        &self,
        source: &str,
        kind: &str,
        message: impl Into<String>,
        metadata: Option<Map<String, Value>>,
    ) {
        let mut event = FeedEvent::new(source, kind, message);
        for (k, v) in metadata.into_iter().flatten() {
            event = event.with_metadata(k, v);
        }
        self.record(event);
    }

    /// Returns up to `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<FeedEvent> {
        let ring = self.inner.events.lock();
        ring.buf.iter().take(limit).cloned().collect()
    }

    /// Number of events currently held.
    pub fn len(&self) -> usize {
        self.inner.events.lock().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Total number of events ever offered to the feed, evicted ones included.
    pub fn total_recorded(&self) -> u64 {
        self.inner.events.lock().recorded
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl std::fmt::Debug for EventFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFeed")
            .field("capacity", &self.inner.capacity)
            .field("len", &self.len())
            .finish()
    }
}
