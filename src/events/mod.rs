//! Supervisor events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to lifecycle events emitted by the process supervisor and
//! the subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ProcessSupervisor` (startup, monitor, shutdown),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the supervisor's listener, which fans out to the
//!   [`SubscriberSet`](crate::SubscriberSet) (`LogWriter`, `FeedRecorder`).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
