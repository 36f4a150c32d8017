//! Activity feed: the bounded event buffer shared by producers and the dashboard.
//!
//! ## Contents
//! - [`FeedEvent`] one immutable feed entry
//! - [`EventFeed`] bounded, thread-safe, newest-first buffer
//! - [`FeedExporter`] periodic JSON snapshot for the out-of-process renderer

mod event;
mod export;
mod store;

pub use event::FeedEvent;
pub use export::FeedExporter;
pub use store::{DEFAULT_FEED_CAPACITY, EventFeed};
