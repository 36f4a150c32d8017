//! Activity sources: background producers of feed events.
//!
//! Each source runs in its own [`SourceWorker`] (one tokio task), polled on a
//! fixed interval. Workers share nothing but the [`EventFeed`](crate::EventFeed).
//!
//! ## Contents
//! - [`ActivitySource`] the polled-producer trait, [`TickOutcome`]
//! - [`SourceWorker`], [`spawn_workers`] the polling loop
//! - [`PostsSource`] HTTP poller of a posts listing endpoint
//! - [`HeartbeatSource`] uptime line

mod heartbeat;
mod posts;
mod source;
mod worker;

pub use heartbeat::HeartbeatSource;
pub use posts::{PostsConfig, PostsSource};
pub use source::{ActivitySource, TickOutcome};
pub use worker::{SourceWorker, spawn_workers};
