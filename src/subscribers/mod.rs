//! # Subscribers of supervisor events.
//!
//! ```text
//! ProcessSupervisor ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                                ├─► LogWriter     (tracing)
//!                                                                ├─► FeedRecorder  (EventFeed)
//!                                                                └─► custom Subscribe impls
//! ```

mod feed;
mod log;
mod set;
mod subscribe;

pub use feed::{FeedRecorder, STREAM_SOURCE};
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
