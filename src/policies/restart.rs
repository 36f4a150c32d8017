//! # Restart policies for pipeline stages.
//!
//! [`RestartPolicy`] determines whether a stage is relaunched when the
//! steady-state monitor finds it dead.
//!
//! - [`RestartPolicy::Never`] the stage is left down (its loss is logged once).
//! - [`RestartPolicy::Always`] the stage is relaunched on every detected exit,
//!   optionally after a cooldown computed by a [`BackoffPolicy`].
//!
//! ## Pipeline defaults
//! ```text
//! display   → Never
//! renderer  → Always { cooldown: None }            restart immediately
//! encoder   → Always { cooldown: Some(5s const) }  wait, then restart
//! ```
//!
//! There is no retry cap: a stage that keeps dying keeps being restarted.

use super::BackoffPolicy;

/// Policy controlling whether a crashed stage is relaunched.
#[derive(Clone, Copy, Debug)]
pub enum RestartPolicy {
    /// Never restart: the stage stays down for the rest of the run.
    Never,
    /// Restart on every detected exit.
    ///   - `cooldown`: delay before relaunching.
    ///   - `None` → relaunch immediately
    ///   - `Some(policy)` → wait `policy.next(consecutive_crashes)` first
    Always { cooldown: Option<BackoffPolicy> },
}

impl RestartPolicy {
    /// Delay before the restart following `crashes` consecutive crashes
    /// (0-indexed), or `None` when the stage must not be restarted.
    pub fn delay(&self, crashes: u32) -> Option<std::time::Duration> {
        match self {
            RestartPolicy::Never => None,
            RestartPolicy::Always { cooldown: None } => Some(std::time::Duration::ZERO),
            RestartPolicy::Always {
                cooldown: Some(policy),
            } => Some(policy.next(crashes)),
        }
    }
}

impl Default for RestartPolicy {
    /// Returns [`RestartPolicy::Always`] without cooldown.
    fn default() -> Self {
        RestartPolicy::Always { cooldown: None }
    }
}
