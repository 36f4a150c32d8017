//! # SourceWorker: fixed-interval polling loop for one source.
//!
//! ## Loop
//! ```text
//! record system/init (optional)
//! loop {
//!   ├─► tick(feed)          (cancellable)
//!   ├─► log outcome
//!   └─► sleep(interval)     (cancellable)
//! }
//! ```
//!
//! ## Rules
//! - Ticks of one worker run **sequentially**, never overlapping.
//! - The interval does not change after failures or rate limits.
//! - Cancellation is observed during the tick and during the sleep.

use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::{ActivitySource, TickOutcome};
use crate::feed::EventFeed;

/// Drives one [`ActivitySource`] until cancelled.
pub struct SourceWorker {
    source: Box<dyn ActivitySource>,
    feed: EventFeed,
    interval: Duration,
}

impl SourceWorker {
    pub fn new(source: impl ActivitySource, feed: EventFeed, interval: Duration) -> Self {
        Self {
            source: Box::new(source),
            feed,
            interval,
        }
    }

    /// Runs the polling loop; returns the number of completed ticks.
    pub async fn run(mut self, token: CancellationToken) -> u64 {
        if let Some(msg) = self.source.started_message() {
            self.feed.push("system", "init", msg, None);
        }

        let mut ticks = 0u64;
        loop {
            let outcome = tokio::select! {
                _ = token.cancelled() => break,
                outcome = self.source.tick(&self.feed) => outcome,
            };
            ticks += 1;
            self.log(&outcome);

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        tracing::debug!(source = self.source.name(), ticks, "source worker stopped");
        ticks
    }

    fn log(&self, outcome: &TickOutcome) {
        let source = self.source.name();
        match outcome {
            TickOutcome::Recorded(n) => tracing::debug!(source, recorded = n, "source tick"),
            TickOutcome::Idle => tracing::trace!(source, "source tick: nothing new"),
            TickOutcome::RateLimited => tracing::info!(source, "source rate limited"),
            TickOutcome::Failed(e) => {
                tracing::debug!(source, error = %e, label = e.as_label(), "source tick failed")
            }
        }
    }
}

/// Spawns every worker onto a join set, each with a child of `token`.
pub fn spawn_workers(workers: Vec<SourceWorker>, token: &CancellationToken) -> JoinSet<u64> {
    let mut set = JoinSet::new();
    for worker in workers {
        set.spawn(worker.run(token.child_token()));
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::time::Instant;

    struct Flaky {
        ticks: u32,
    }

    #[async_trait]
    impl ActivitySource for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn tick(&mut self, feed: &EventFeed) -> TickOutcome {
            self.ticks += 1;
            if self.ticks % 2 == 0 {
                feed.push("flaky", "error", "Fetch error: boom", None);
                TickOutcome::Failed(FetchError::Transport("boom".into()))
            } else {
                feed.push("flaky", "item", format!("item {}", self.ticks), None);
                TickOutcome::Recorded(1)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_polling() {
        let feed = EventFeed::new(100);
        let token = CancellationToken::new();
        let worker = SourceWorker::new(Flaky { ticks: 0 }, feed.clone(), Duration::from_secs(30));
        let handle = tokio::spawn(worker.run(token.clone()));

        // ticks at t=0, 30, 60, 90
        tokio::time::sleep(Duration::from_secs(95)).await;
        token.cancel();
        let ticks = handle.await.unwrap();

        assert_eq!(ticks, 4);
        let kinds: Vec<String> = feed.recent(100).iter().map(|e| e.kind().to_string()).collect();
        assert_eq!(kinds, ["error", "item", "error", "item", "init"]);
        assert_eq!(feed.recent(100)[4].message(), "flaky activity poller started");
    }

    /// Rate limited on the first tick, healthy afterwards; remembers when it ran.
    struct Throttled {
        at: Arc<Mutex<Vec<Instant>>>,
    }

    #[async_trait]
    impl ActivitySource for Throttled {
        fn name(&self) -> &str {
            "throttled"
        }

        async fn tick(&mut self, feed: &EventFeed) -> TickOutcome {
            let mut at = self.at.lock();
            at.push(Instant::now());
            if at.len() == 1 {
                feed.push("throttled", "rate_limit", "Rate limited", None);
                TickOutcome::RateLimited
            } else {
                TickOutcome::Idle
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_keeps_the_interval() {
        let feed = EventFeed::new(100);
        let token = CancellationToken::new();
        let at = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();
        let worker = SourceWorker::new(
            Throttled { at: at.clone() },
            feed.clone(),
            Duration::from_secs(30),
        );
        let handle = tokio::spawn(worker.run(token.clone()));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(at.lock().len(), 1);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(at.lock().len(), 2);

        token.cancel();
        assert_eq!(handle.await.unwrap(), 2);

        let at = at.lock();
        assert_eq!(at[0] - start, Duration::ZERO);
        assert_eq!(at[1] - at[0], Duration::from_secs(30));
        let kinds: Vec<String> = feed.recent(100).iter().map(|e| e.kind().to_string()).collect();
        assert_eq!(kinds, ["rate_limit", "init"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_workers_stop_with_parent_token() {
        let feed = EventFeed::default();
        let token = CancellationToken::new();
        let mut set = spawn_workers(
            vec![
                SourceWorker::new(Flaky { ticks: 0 }, feed.clone(), Duration::from_secs(5)),
                SourceWorker::new(Flaky { ticks: 0 }, feed.clone(), Duration::from_secs(7)),
            ],
            &token,
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
        let mut finished = 0;
        while let Some(res) = set.join_next().await {
            assert_eq!(res.unwrap(), 1);
            finished += 1;
        }
        assert_eq!(finished, 2);
    }
}
