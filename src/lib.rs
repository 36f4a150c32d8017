//! # streamvisor
//!
//! **Streamvisor** keeps a live-streaming pipeline on the air: a virtual
//! display, a dashboard renderer drawing into it and an `ffmpeg` encoder
//! capturing the display and pushing it to an RTMP ingest (or to a local
//! file in preview mode).
//!
//! ## Architecture
//! ```text
//!   ActivitySource ─► SourceWorker ──┐          ┌──► FeedExporter ─► STREAM_FEED_PATH ─► renderer
//!   ActivitySource ─► SourceWorker ──┼─► EventFeed (bounded, newest first)
//!                    FeedRecorder ───┘          ▲
//!                          ▲                    └──── dashboard reads recent(n)
//!                          │
//! ┌────────────────────────┴─────────────────────────────────────────┐
//! │ ProcessSupervisor                                                │
//! │  startup:  display ─► renderer ─► encoder   (settle + liveness)  │
//! │  monitor:  poll every 10s, restart per RestartPolicy             │
//! │  shutdown: SIGTERM ─► grace ─► SIGKILL, reverse order, once      │
//! │  Bus ─► SubscriberSet ─► LogWriter / FeedRecorder / custom       │
//! └──────────┬───────────────────┬───────────────────┬───────────────┘
//!            ▼                   ▼                   ▼
//!          Xvfb             renderer cmd           ffmpeg
//! ```
//!
//! ## Stage policies
//! | stage    | on crash                   |
//! |----------|----------------------------|
//! | display  | logged once, left down     |
//! | renderer | restarted immediately      |
//! | encoder  | restarted after a cooldown |
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use streamvisor::{
//!     Config, EventFeed, FeedRecorder, HeartbeatSource, LogWriter, ProcessSupervisor,
//!     SourceWorker, spawn_workers,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), streamvisor::RuntimeError> {
//!     let feed = EventFeed::default();
//!     let token = CancellationToken::new();
//!     let _workers = spawn_workers(
//!         vec![SourceWorker::new(HeartbeatSource::new(), feed.clone(), Duration::from_secs(30))],
//!         &token,
//!     );
//!
//!     let cfg = Config { stream_key: Some("xxxx-xxxx".into()), ..Config::default() };
//!     let sup = ProcessSupervisor::new(
//!         cfg,
//!         vec![Arc::new(LogWriter), Arc::new(FeedRecorder::new(feed))],
//!     );
//!     let res = sup.run_until_signal().await;
//!     token.cancel();
//!     res
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod feed;
mod policies;
mod sources;
mod stages;
mod subscribers;

pub use config::{Bitrate, Config, MAX_FPS, MAX_POLL_INTERVAL, Resolution, RunMode};
pub use core::{ProcessSupervisor, ShutdownSignals};
pub use error::{ConfigError, FetchError, RuntimeError, StageError};
pub use events::{Bus, Event, EventKind};
pub use feed::{DEFAULT_FEED_CAPACITY, EventFeed, FeedEvent, FeedExporter};
pub use policies::{BackoffPolicy, JitterPolicy, RestartPolicy};
pub use sources::{
    ActivitySource, HeartbeatSource, PostsConfig, PostsSource, SourceWorker, TickOutcome,
    spawn_workers,
};
pub use stages::{CommandSpec, Launcher, ProcessLauncher, StageExit, StageHandle, StageRole};
pub use subscribers::{FeedRecorder, LogWriter, STREAM_SOURCE, Subscribe, SubscriberSet};
