//! # Feed event: one line of the dashboard's activity log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A timestamped record of something that happened, shown in the feed.
///
/// Immutable once built: fields are only readable through accessors.
///
/// ## Example
/// ```rust
/// use streamvisor::FeedEvent;
///
/// let ev = FeedEvent::new("moltbook", "post", "New post: hello")
///     .with_metadata("post_id", "p1");
/// assert_eq!(ev.kind(), "post");
/// assert_eq!(ev.metadata()["post_id"], "p1");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEvent {
    timestamp: DateTime<Utc>,
    source: String,
    #[serde(rename = "type")]
    kind: String,
    message: String,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl FeedEvent {
    /// Creates an event stamped with the current UTC time and no metadata.
    pub fn new(
        source: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            source: source.into(),
            kind: kind.into(),
            message: message.into(),
            metadata: Map::new(),
        }
    }

    /// Adds one metadata entry.
    #[inline]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Overrides the timestamp.
    #[inline]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Producer name (`moltbook`, `system`, `stream`, ...).
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Event type (`post`, `rate_limit`, `error`, `heartbeat`, ...).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }
}
