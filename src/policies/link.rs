//! # Retry policy for the network link.
//!
//! The link layer uses a simpler policy than host connections: a fixed delay
//! between reconnect requests (the link driver does its own association
//! work), plus a hard ceiling on how long the device may sit without a link
//! before the condition is treated as fatal.

use std::time::Duration;

/// Fixed-delay retry policy for link reconnection.
///
/// Defaults: a reconnect request every 30 s while the link is down, and
/// give-up after 15 minutes offline.
#[derive(Clone, Copy, Debug)]
pub struct LinkRetryPolicy {
    /// Delay between two consecutive link reconnect requests.
    pub retry_delay: Duration,
    /// Hard ceiling on total continuous link-down time; exceeding it is
    /// fatal ([`RuntimeError::OfflineBudgetExhausted`](crate::RuntimeError)).
    pub max_offline: Duration,
}

impl Default for LinkRetryPolicy {
    /// Returns `retry_delay = 30s`, `max_offline = 900s`.
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(30),
            max_offline: Duration::from_secs(900),
        }
    }
}

impl LinkRetryPolicy {
    /// True once `offline` exceeds the hard ceiling.
    #[inline]
    pub fn offline_exhausted(&self, offline: Duration) -> bool {
        offline > self.max_offline
    }
}
