//! # Backoff policy for host-connect retries.
//!
//! [`ConnectBackoffPolicy`] controls the delay before the next connect
//! attempt after repeated failures. It is parameterized by:
//! - [`ConnectBackoffPolicy::unit`] the linear growth step;
//! - [`ConnectBackoffPolicy::soft_ceiling`] the failure count that switches
//!   to a long cooldown;
//! - [`ConnectBackoffPolicy::hard_ceiling`] the failure count that gives up.
//!
//! Below the soft ceiling the delay for `n` consecutive failures is
//! `n × unit` — long enough to avoid hot-looping against a degraded host,
//! short enough to recover quickly from a blip. At the soft ceiling the
//! policy forces one long [`soft_cooldown`](ConnectBackoffPolicy::soft_cooldown)
//! before the final attempt. At the hard ceiling it stops retrying entirely:
//! the caller must surface [`GiveUp`](BackoffDecision::GiveUp) as a fatal
//! condition for an external restart.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use linkvisor::{BackoffDecision, ConnectBackoffPolicy};
//!
//! let backoff = ConnectBackoffPolicy::default();
//!
//! // Failures below the soft ceiling grow linearly.
//! assert_eq!(backoff.next(1), BackoffDecision::Wait(Duration::from_secs(10)));
//! assert_eq!(backoff.next(7), BackoffDecision::Wait(Duration::from_secs(70)));
//!
//! // The soft ceiling forces a long cooldown.
//! assert_eq!(backoff.next(11), BackoffDecision::Wait(Duration::from_secs(300)));
//!
//! // The hard ceiling gives up.
//! assert_eq!(backoff.next(12), BackoffDecision::GiveUp);
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// What to do after a failed connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
    /// Wait this long before the next attempt.
    Wait(Duration),
    /// The retry budget is exhausted; stop retrying and surface a fatal
    /// condition.
    GiveUp,
}

/// Escalating retry policy for host connections.
///
/// The ceilings are product-tuning knobs, not correctness requirements —
/// they are plain fields so hosts can adjust them. The defaults suit a
/// battery-class device: 10 s steps, a 5 minute cooldown on the 11th
/// consecutive failure, give-up on the 12th.
#[derive(Clone, Copy, Debug)]
pub struct ConnectBackoffPolicy {
    /// Linear growth step: failure `n` (below the soft ceiling) waits
    /// `n × unit`.
    pub unit: Duration,
    /// Failure count at which the policy switches to `soft_cooldown`.
    pub soft_ceiling: u32,
    /// The long cooldown applied at the soft ceiling.
    pub soft_cooldown: Duration,
    /// Failure count at which the policy gives up. Must be above
    /// `soft_ceiling` to leave room for the cooldown attempt.
    pub hard_ceiling: u32,
    /// Jitter applied to every computed wait.
    pub jitter: JitterPolicy,
}

impl Default for ConnectBackoffPolicy {
    /// Returns the defaults:
    /// - `unit = 10s`;
    /// - `soft_ceiling = 11`, `soft_cooldown = 300s`;
    /// - `hard_ceiling = 12`;
    /// - no jitter.
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(10),
            soft_ceiling: 11,
            soft_cooldown: Duration::from_secs(300),
            hard_ceiling: 12,
            jitter: JitterPolicy::None,
        }
    }
}

impl ConnectBackoffPolicy {
    /// Computes the decision after `failures` consecutive failed attempts.
    ///
    /// `failures = 0` (no failure yet) waits nothing: the next attempt is
    /// immediate. Jitter is applied to the computed wait but never to the
    /// give-up decision.
    pub fn next(&self, failures: u32) -> BackoffDecision {
        if failures == 0 {
            return BackoffDecision::Wait(Duration::ZERO);
        }
        if failures >= self.hard_ceiling {
            return BackoffDecision::GiveUp;
        }
        let base = if failures >= self.soft_ceiling {
            self.soft_cooldown
        } else {
            self.unit.saturating_mul(failures)
        };
        BackoffDecision::Wait(self.jitter.apply(base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> ConnectBackoffPolicy {
        ConnectBackoffPolicy::default()
    }

    #[test]
    fn test_zero_failures_waits_nothing() {
        assert_eq!(no_jitter().next(0), BackoffDecision::Wait(Duration::ZERO));
    }

    #[test]
    fn test_linear_ladder_below_soft_ceiling() {
        let policy = no_jitter();
        for failures in 1..=10 {
            assert_eq!(
                policy.next(failures),
                BackoffDecision::Wait(Duration::from_secs(10 * u64::from(failures))),
                "failure {} should wait failures x unit",
                failures
            );
        }
    }

    #[test]
    fn test_soft_ceiling_forces_cooldown() {
        assert_eq!(
            no_jitter().next(11),
            BackoffDecision::Wait(Duration::from_secs(300))
        );
    }

    #[test]
    fn test_hard_ceiling_gives_up() {
        let policy = no_jitter();
        assert_eq!(policy.next(12), BackoffDecision::GiveUp);
        assert_eq!(policy.next(13), BackoffDecision::GiveUp);
        assert_eq!(policy.next(u32::MAX), BackoffDecision::GiveUp);
    }

    #[test]
    fn test_custom_ceilings() {
        let policy = ConnectBackoffPolicy {
            unit: Duration::from_millis(500),
            soft_ceiling: 3,
            soft_cooldown: Duration::from_secs(60),
            hard_ceiling: 5,
            jitter: JitterPolicy::None,
        };
        assert_eq!(
            policy.next(2),
            BackoffDecision::Wait(Duration::from_secs(1))
        );
        assert_eq!(
            policy.next(3),
            BackoffDecision::Wait(Duration::from_secs(60))
        );
        assert_eq!(
            policy.next(4),
            BackoffDecision::Wait(Duration::from_secs(60))
        );
        assert_eq!(policy.next(5), BackoffDecision::GiveUp);
    }

    #[test]
    fn test_full_jitter_stays_below_base() {
        let policy = ConnectBackoffPolicy {
            jitter: JitterPolicy::Full,
            ..ConnectBackoffPolicy::default()
        };
        for failures in 1..=10 {
            match policy.next(failures) {
                BackoffDecision::Wait(d) => assert!(
                    d <= Duration::from_secs(10 * u64::from(failures)),
                    "failure {}: jittered delay {:?} above base",
                    failures,
                    d
                ),
                BackoffDecision::GiveUp => panic!("unexpected give-up at {failures}"),
            }
        }
    }

    #[test]
    fn test_equal_jitter_keeps_half_of_base() {
        let policy = ConnectBackoffPolicy {
            jitter: JitterPolicy::Equal,
            ..ConnectBackoffPolicy::default()
        };
        for failures in 1..=10 {
            let base = Duration::from_secs(10 * u64::from(failures));
            match policy.next(failures) {
                BackoffDecision::Wait(d) => {
                    assert!(d >= base / 2, "failure {failures}: {d:?} below half of base");
                    assert!(d <= base, "failure {failures}: {d:?} above base");
                }
                BackoffDecision::GiveUp => panic!("unexpected give-up at {failures}"),
            }
        }
    }
}
