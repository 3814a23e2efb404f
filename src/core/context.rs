//! # Per-connection bookkeeping.
//!
//! [`ConnectionContext`] holds the counters and countdowns the state machine
//! steers by. It is owned and mutated exclusively by the main-loop context —
//! the notification/timer contexts communicate with it only indirectly,
//! through bits in the shared state register.

use std::sync::Arc;
use std::time::Duration;

/// Counters, countdowns, and cached identity of the connection machinery.
///
/// Reset rules:
/// - `host_failures` resets on every successful host connect;
/// - `link_failures` resets while the link is up (and when a reconnect
///   request is issued);
/// - `retry_delay` is shared by the host-connect and link-retry gates (only
///   one of them is active at a time — they live on opposite sides of the
///   link-up branch);
/// - `offline` accumulates only while the link is down.
#[derive(Debug, Default)]
pub(crate) struct ConnectionContext {
    /// Consecutive failed host-connect attempts.
    pub(crate) host_failures: u32,
    /// Consecutive link losses since the link was last stable.
    pub(crate) link_failures: u32,
    /// Countdown until the next connect attempt, in wall time decremented
    /// by one tick period per tick.
    pub(crate) retry_delay: Duration,
    /// Accumulated continuous link-down time.
    pub(crate) offline: Duration,
    /// Whether the protocol transport is currently open.
    pub(crate) transport_open: bool,
    /// Session identity cached from the last successful authorization.
    pub(crate) session: Option<Arc<str>>,
}

impl ConnectionContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Decrements the retry countdown by one tick; returns true when the
    /// gate is open (countdown reached zero).
    pub(crate) fn tick_retry_gate(&mut self, tick: Duration) -> bool {
        self.retry_delay = self.retry_delay.saturating_sub(tick);
        self.retry_delay.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_gate_opens_at_zero() {
        let mut ctx = ConnectionContext::new();
        ctx.retry_delay = Duration::from_millis(500);
        let tick = Duration::from_millis(200);

        assert!(!ctx.tick_retry_gate(tick)); // 300ms left
        assert!(!ctx.tick_retry_gate(tick)); // 100ms left
        assert!(ctx.tick_retry_gate(tick)); // saturated to zero
        assert!(ctx.tick_retry_gate(tick)); // stays open
    }
}
