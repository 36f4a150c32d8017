//! # Mirrors pipeline health into the activity feed.
//!
//! [`FeedRecorder`] records a subset of supervisor events into the
//! [`EventFeed`] under source `stream`, so the dashboard can show that a
//! stage restarted without reading the logs. Routine steps (starting,
//! stopping) and subscriber reports are not mirrored.

use async_trait::async_trait;

use super::Subscribe;
use crate::events::{Event, EventKind};
use crate::feed::{EventFeed, FeedEvent};

/// Feed `source` of mirrored events.
pub const STREAM_SOURCE: &str = "stream";

/// Records stage health changes into an [`EventFeed`].
#[derive(Debug, Clone)]
pub struct FeedRecorder {
    feed: EventFeed,
}

impl FeedRecorder {
    pub fn new(feed: EventFeed) -> Self {
        Self { feed }
    }

    fn message(e: &Event) -> Option<String> {
        let stage = e.stage.map_or("pipeline", |s| s.as_str());
        let reason = e.reason.as_deref().unwrap_or("unknown");
        let msg = match e.kind {
            EventKind::StageRunning if e.attempt.unwrap_or(0) > 0 => {
                format!("{stage} restarted")
            }
            EventKind::StageRunning => format!("{stage} running"),
            EventKind::StageStartFailed => format!("{stage} failed to start: {reason}"),
            EventKind::StageCrashed => format!("{stage} crashed ({reason})"),
            EventKind::RestartScheduled => {
                let secs = f64::from(e.delay_ms.unwrap_or(0)) / 1000.0;
                format!("{stage} restarting in {secs:.0}s")
            }
            EventKind::StageLost => format!("{stage} lost: {reason}"),
            EventKind::ShutdownRequested => "Stream shutting down".to_string(),
            EventKind::StageKilled => format!("{stage} force-killed"),
            _ => return None,
        };
        Some(msg)
    }
}

#[async_trait]
impl Subscribe for FeedRecorder {
    async fn on_event(&self, e: &Event) {
        let Some(message) = Self::message(e) else {
            return;
        };
        let mut ev = FeedEvent::new(STREAM_SOURCE, e.kind.as_label(), message);
        if let Some(stage) = e.stage {
            ev = ev.with_metadata("stage", stage.as_str());
        }
        if let Some(pid) = e.pid {
            ev = ev.with_metadata("pid", pid);
        }
        self.feed.record(ev);
    }

    fn name(&self) -> &'static str {
        "feed-recorder"
    }
}
