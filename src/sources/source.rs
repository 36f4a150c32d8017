//! # Activity source abstraction.
//!
//! An [`ActivitySource`] is polled by a [`SourceWorker`](super::SourceWorker)
//! on a fixed interval. Each [`tick`](ActivitySource::tick) turns whatever
//! happened since the previous tick into zero or more feed events.
//!
//! Sources never fail: network errors, rate limits and malformed responses are
//! recorded as feed events and reported through [`TickOutcome`] for logging.

use async_trait::async_trait;

use crate::error::FetchError;
use crate::feed::EventFeed;

/// What a single tick produced.
#[derive(Debug)]
pub enum TickOutcome {
    /// `n` new items were recorded.
    Recorded(usize),
    /// Nothing new this tick.
    Idle,
    /// The endpoint asked us to slow down; one cooling-down event was recorded.
    RateLimited,
    /// The tick failed; one error event was recorded.
    Failed(FetchError),
}

impl TickOutcome {
    /// Number of items recorded by this tick (0 for everything but `Recorded`).
    pub fn recorded(&self) -> usize {
        match self {
            TickOutcome::Recorded(n) => *n,
            _ => 0,
        }
    }
}

/// # A periodically polled producer of feed events.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use streamvisor::{ActivitySource, EventFeed, TickOutcome};
///
/// struct Clock;
///
/// #[async_trait]
/// impl ActivitySource for Clock {
///     fn name(&self) -> &str { "clock" }
///
///     async fn tick(&mut self, feed: &EventFeed) -> TickOutcome {
///         feed.push("clock", "tick", "tock", None);
///         TickOutcome::Recorded(1)
///     }
/// }
/// ```
#[async_trait]
pub trait ActivitySource: Send + 'static {
    /// Stable, human-readable source name; also the feed event `source`.
    fn name(&self) -> &str;

    /// Polls once and records the results into `feed`.
    ///
    /// Implementations bound their own network calls with a timeout.
    async fn tick(&mut self, feed: &EventFeed) -> TickOutcome;

    /// Message recorded as a `system/init` event when polling starts.
    fn started_message(&self) -> Option<String> {
        Some(format!("{} activity poller started", self.name()))
    }
}
