//! # Structured logging subscriber.
//!
//! [`LogWriter`] turns supervisor events into `tracing` records. Routine
//! lifecycle steps are `info`, recoverable trouble is `warn`, and losing a
//! stage or exceeding the grace period is `error`.
//!
//! ```text
//! INFO  stage running stage=renderer pid=4242 attempt=0
//! WARN  stage crashed stage=encoder pid=4243 reason="exit code 1"
//! INFO  restart scheduled stage=encoder delay_ms=5000 attempt=1
//! ERROR stage lost, not restarted stage=display reason="killed by signal 9"
//! ```

use async_trait::async_trait;

use super::Subscribe;
use crate::events::{Event, EventKind};

/// Logs every supervisor event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let stage = e.stage.map(|s| s.as_str());
        let reason = e.reason.as_deref();
        match e.kind {
            EventKind::StageStarting => {
                tracing::info!(stage, attempt = e.attempt, "starting stage")
            }
            EventKind::StageRunning => {
                tracing::info!(stage, pid = e.pid, attempt = e.attempt, "stage running")
            }
            EventKind::StageStartFailed => {
                tracing::error!(stage, attempt = e.attempt, reason, "stage failed to start")
            }
            EventKind::StageCrashed => {
                tracing::warn!(stage, pid = e.pid, reason, "stage crashed")
            }
            EventKind::RestartScheduled => {
                tracing::info!(stage, delay_ms = e.delay_ms, attempt = e.attempt, "restart scheduled")
            }
            EventKind::StageLost => {
                tracing::error!(stage, reason, "stage lost, not restarted")
            }
            EventKind::ShutdownRequested => tracing::info!(reason, "shutdown requested"),
            EventKind::StageStopped => tracing::info!(stage, pid = e.pid, "stage stopped"),
            EventKind::StageKilled => {
                tracing::warn!(stage, pid = e.pid, grace_ms = e.timeout_ms, "stage force-killed")
            }
            EventKind::AllStoppedWithin => tracing::info!("all stages stopped within grace"),
            EventKind::GraceExceeded => tracing::error!(reason, "grace period exceeded"),
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                tracing::warn!(reason, kind = e.kind.as_label(), "subscriber trouble")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
