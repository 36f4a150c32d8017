//! # Heartbeat: periodic uptime line in the feed.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{ActivitySource, TickOutcome};
use crate::feed::EventFeed;

/// Records `system/heartbeat` "Uptime: HH:MM:SS | Feed: N events" on every tick.
pub struct HeartbeatSource {
    started: Instant,
}

impl HeartbeatSource {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for HeartbeatSource {
    fn default() -> Self {
        Self::new()
    }
}

fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[async_trait]
impl ActivitySource for HeartbeatSource {
    fn name(&self) -> &str {
        "heartbeat"
    }

    async fn tick(&mut self, feed: &EventFeed) -> TickOutcome {
        let msg = format!(
            "Uptime: {} | Feed: {} events",
            format_uptime(self.started.elapsed()),
            feed.len()
        );
        feed.push("system", "heartbeat", msg, None);
        TickOutcome::Recorded(1)
    }

    fn started_message(&self) -> Option<String> {
        None
    }
}
