//! # Feed exporter: hands the in-process feed to the renderer.
//!
//! The renderer is a separate program, so it cannot read [`EventFeed`]
//! directly. [`FeedExporter`] periodically writes `recent(limit)` as a JSON
//! array to a file; the supervisor passes that path to the renderer as
//! `STREAM_FEED_PATH`.
//!
//! The file is replaced atomically (write to `<path>.tmp`, then rename) so
//! the renderer never reads a half-written snapshot.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::EventFeed;

/// Periodic JSON snapshot writer.
pub struct FeedExporter {
    feed: EventFeed,
    path: PathBuf,
    limit: usize,
    interval: Duration,
}

impl FeedExporter {
    pub fn new(feed: EventFeed, path: impl Into<PathBuf>) -> Self {
        Self {
            feed,
            path: path.into(),
            limit: 50,
            interval: Duration::from_secs(2),
        }
    }

    /// Number of newest events written per snapshot (default 50).
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Time between snapshots (default 2s).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one snapshot.
    pub async fn export_once(&self) -> std::io::Result<()> {
        let events = self.feed.recent(self.limit);
        let body = serde_json::to_vec(&events)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await
    }

    /// Writes snapshots until `token` is cancelled, then one final snapshot.
    ///
    /// Write errors are logged and skipped. Await the task after cancelling to
    /// be sure the last events (shutdown included) reached the file.
    pub async fn run(self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.export_logged().await,
            }
        }
        self.export_logged().await;
    }

    async fn export_logged(&self) {
        if let Err(e) = self.export_once().await {
            tracing::warn!(path = %self.path.display(), error = %e, "feed export failed");
        }
    }
}
