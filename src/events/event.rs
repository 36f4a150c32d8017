//! # Lifecycle events emitted by the process supervisor.
//!
//! The [`EventKind`] enum classifies events across four categories:
//! - **Stage lifecycle**: launch, liveness confirmed, startup failure
//! - **Crash handling**: crash detected, cooldown scheduled, stage lost
//! - **Shutdown**: request, per-stage termination/kill, final outcome
//! - **Subscriber health**: overflow and panics in subscriber workers
//!
//! The [`Event`] struct carries metadata such as timestamps, stage, pid,
//! restart attempt, reasons and delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use streamvisor::{Event, EventKind, StageRole};
//!
//! let ev = Event::new(EventKind::StageCrashed)
//!     .with_stage(StageRole::Encoder)
//!     .with_pid(4242)
//!     .with_reason("exit code 1");
//!
//! assert_eq!(ev.kind, EventKind::StageCrashed);
//! assert_eq!(ev.stage, Some(StageRole::Encoder));
//! assert_eq!(ev.reason.as_deref(), Some("exit code 1"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::stages::StageRole;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of supervisor events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `reason` (subscriber name and panic info)
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason` (subscriber name and cause)
    SubscriberOverflow,

    // === Stage lifecycle ===
    /// A stage process is being spawned.
    ///
    /// Sets: `stage`, `attempt` (0 for the initial launch, n for the n-th restart)
    StageStarting,

    /// A stage survived its settle delay.
    ///
    /// Sets: `stage`, `pid`, `attempt`
    StageRunning,

    /// A stage died during its settle delay or could not be spawned.
    ///
    /// Sets: `stage`, `reason`, `attempt`
    StageStartFailed,

    // === Crash handling ===
    /// Steady-state monitor found a stage that exited.
    ///
    /// Sets: `stage`, `pid`, `reason` (exit description)
    StageCrashed,

    /// A cooldown was scheduled before restarting a stage.
    ///
    /// Sets: `stage`, `delay_ms`, `attempt`
    RestartScheduled,

    /// A crashed stage whose policy forbids restarts is left down.
    ///
    /// Sets: `stage`, `reason`
    StageLost,

    // === Shutdown ===
    /// Shutdown requested (OS signal or fatal startup failure).
    ///
    /// Sets: `reason` (optional)
    ShutdownRequested,

    /// A stage exited after the termination request.
    ///
    /// Sets: `stage`, `pid`
    StageStopped,

    /// A stage ignored the termination request and was force-killed.
    ///
    /// Sets: `stage`, `pid`, `timeout_ms` (grace)
    StageKilled,

    /// Every stage stopped within its grace period.
    AllStoppedWithin,

    /// At least one stage had to be force-killed.
    ///
    /// Sets: `reason` (killed stages)
    GraceExceeded,
}

impl EventKind {
    /// Short kebab-case label, used as the feed event kind and in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::SubscriberPanicked => "subscriber-panicked",
            EventKind::SubscriberOverflow => "subscriber-overflow",
            EventKind::StageStarting => "stage-starting",
            EventKind::StageRunning => "stage-running",
            EventKind::StageStartFailed => "stage-start-failed",
            EventKind::StageCrashed => "stage-crashed",
            EventKind::RestartScheduled => "restart-scheduled",
            EventKind::StageLost => "stage-lost",
            EventKind::ShutdownRequested => "shutdown-requested",
            EventKind::StageStopped => "stage-stopped",
            EventKind::StageKilled => "stage-killed",
            EventKind::AllStoppedWithin => "all-stopped-within-grace",
            EventKind::GraceExceeded => "grace-exceeded",
        }
    }
}

/// Supervisor event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Stage concerned, if any.
    pub stage: Option<StageRole>,
    /// OS process id of the stage.
    pub pid: Option<u32>,
    /// Restart attempt (0 = initial launch).
    pub attempt: Option<u32>,
    /// Cooldown before the next launch in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Grace period in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (exit status, errors, overflow details).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            stage: None,
            pid: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            reason: None,
        }
    }

    /// Attaches the stage role.
    #[inline]
    pub fn with_stage(mut self, stage: StageRole) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Attaches a process id, when known.
    #[inline]
    pub fn with_pid(mut self, pid: impl Into<Option<u32>>) -> Self {
        self.pid = pid.into();
        self
    }

    /// Attaches a restart attempt number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a cooldown delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a grace period (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} panic={info}"))
    }

    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
