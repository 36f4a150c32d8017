//! Restart and cooldown policies for pipeline stages.
//!
//! This module groups the knobs that control **if** a crashed stage is
//! relaunched and **how long** the supervisor waits before doing so.
//!
//! ## Contents
//! - [`RestartPolicy`] whether to restart a stage (never / always)
//! - [`BackoffPolicy`] how cooldown delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization of cooldowns
//!
//! ## Quick wiring
//! ```text
//! Config::restart_policy(role) ─► RestartPolicy
//!      └─► core::supervisor uses:
//!           - restart to decide relaunch / leave down
//!           - cooldown.next(consecutive_crashes) to wait before relaunching
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=5s, factor=1.0 (constant), max=60s, jitter=None.
//! - `JitterPolicy::None` by default.

mod backoff;
mod jitter;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::RestartPolicy;
