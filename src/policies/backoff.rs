//! # Cooldown policy for restarting crashed stages.
//!
//! [`BackoffPolicy`] controls how the wait before a stage restart grows when
//! the same stage keeps crashing. It is parameterized by:
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::first`] the initial delay;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay after `n` consecutive crashes is `first × factor^n`, clamped to
//! `max`, then jitter is applied. The base delay is derived from the crash
//! count only, so jitter output never feeds back into later delays.
//!
//! The encoder uses [`BackoffPolicy::constant`] (5s) by default, a fixed
//! cooldown between crash detection and relaunch.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use streamvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_secs(5),
//!     max: Duration::from_secs(60),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_secs(5));
//! assert_eq!(backoff.next(1), Duration::from_secs(10));
//! assert_eq!(backoff.next(10), Duration::from_secs(60));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Restart cooldown policy.
///
/// - [`BackoffPolicy::factor`] multiplicative growth factor;
/// - [`BackoffPolicy::first`] the delay after the first crash;
/// - [`BackoffPolicy::max`] the maximum delay cap.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first restart.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter policy.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns a strategy with:
    /// - `factor = 1.0` (constant delay);
    /// - `first = 5s`;
    /// - `max = 60s`.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(5),
            max: Duration::from_secs(60),
            jitter: JitterPolicy::None,
            factor: 1.0,
        }
    }
}

impl BackoffPolicy {
    /// Same delay for every restart, no jitter.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay after `crashes` consecutive crashes (0-indexed).
    ///
    /// # Notes
    /// - If `factor` equals 1.0, delay remains constant at `first` (up to `max`).
    /// - If `factor` is greater than 1.0, delays grow exponentially up to `max`.
    pub fn next(&self, crashes: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let clamped_exp = crashes.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(clamped_exp);

        let base =
            if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
                self.max
            } else {
                Duration::from_secs_f64(unclamped_secs)
            };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn doubling(jitter: JitterPolicy) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter,
        }
    }

    #[test]
    fn test_constant_cooldown() {
        let policy = BackoffPolicy::constant(Duration::from_secs(5));
        for crashes in 0..20 {
            assert_eq!(policy.next(crashes), Duration::from_secs(5));
        }
    }

    #[test]
    fn test_default_is_constant_five_seconds() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.next(0), Duration::from_secs(5));
        assert_eq!(policy.next(3), Duration::from_secs(5));
    }

    #[test]
    fn test_exponential_growth_no_jitter() {
        let policy = doubling(JitterPolicy::None);
        assert_eq!(policy.next(0), Duration::from_millis(500));
        assert_eq!(policy.next(1), Duration::from_secs(1));
        assert_eq!(policy.next(2), Duration::from_secs(2));
        assert_eq!(policy.next(3), Duration::from_secs(4));
    }

    #[test]
    fn test_clamped_to_max() {
        let policy = doubling(JitterPolicy::None);
        assert_eq!(policy.next(10), Duration::from_secs(30));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_first_exceeds_max() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(10),
            max: Duration::from_secs(5),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn test_equal_jitter_bounds() {
        let policy = doubling(JitterPolicy::Equal);
        for crashes in 0..12 {
            let base_ms = (500.0 * 2.0f64.powi(crashes as i32)).min(30_000.0);
            let delay = policy.next(crashes);
            assert!(delay >= Duration::from_millis((base_ms / 2.0) as u64));
            assert!(delay <= Duration::from_millis(base_ms as u64));
        }
    }

    #[test]
    fn test_full_jitter_never_exceeds_base() {
        let policy = doubling(JitterPolicy::Full);
        for crashes in 0..12 {
            let base_ms = (500.0 * 2.0f64.powi(crashes as i32)).min(30_000.0);
            assert!(policy.next(crashes) <= Duration::from_millis(base_ms as u64));
        }
    }

    #[test]
    fn test_decorrelated_jitter_stays_in_range() {
        let policy = doubling(JitterPolicy::Decorrelated);
        for _ in 0..100 {
            let delay = policy.next(6);
            assert!(delay >= Duration::from_millis(500), "{delay:?} below floor");
            assert!(delay <= Duration::from_secs(30), "{delay:?} above cap");
        }
    }
}
