//! # Global runtime configuration.
//!
//! Provides [`Config`] — centralized settings for the orchestrator runtime.
//!
//! ## Sentinel values
//! - `max_tasks = 0` → unlimited task registrations
//! - `inbound_chunk = 0` → skip the per-tick inbound drain entirely
//!
//! Durations are best-effort in tick units: a countdown expressed here is
//! decremented once per tick by the tick period, so sub-tick precision is
//! neither promised nor needed.

use std::time::Duration;

use crate::client::Identity;
use crate::policies::{ConnectBackoffPolicy, LinkRetryPolicy};

/// Global configuration for the orchestrator runtime.
///
/// ## Field semantics
/// - `tick`: fixed period of the cooperative main loop
/// - `recv_probe_period` / `send_probe_period`: periods of the built-in
///   queue probes that raise the receive/send request bits
/// - `inbound_chunk`: max buffered inbound messages drained per tick
/// - `max_tasks`: task registration limit (`0` = unlimited)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by the bus)
/// - `connect_backoff` / `link_retry`: retry policies (see
///   [`ConnectBackoffPolicy`], [`LinkRetryPolicy`])
/// - `host_address`: where the protocol client connects
/// - `identity`: credentials and device identity submitted on authorize
///
/// ## Notes
/// All fields are public for flexibility; prefer the helper accessors over
/// sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Fixed period of one main-loop tick.
    pub tick: Duration,

    /// Period of the built-in inbound-queue probe.
    pub recv_probe_period: Duration,

    /// Period of the built-in outbound-queue probe.
    pub send_probe_period: Duration,

    /// Maximum buffered inbound messages handed to the drain handler per
    /// tick. `0` disables the per-tick drain.
    pub inbound_chunk: usize,

    /// Maximum number of registered tasks, including the two built-in
    /// probes. `0` = unlimited.
    pub max_tasks: usize,

    /// Capacity of the event bus broadcast ring buffer.
    pub bus_capacity: usize,

    /// Escalating backoff for host-connect retries.
    pub connect_backoff: ConnectBackoffPolicy,

    /// Fixed-delay retry policy for the network link.
    pub link_retry: LinkRetryPolicy,

    /// Address handed to [`ProtocolClient::connect`](crate::ProtocolClient::connect).
    pub host_address: String,

    /// Identity submitted on authorization.
    pub identity: Identity,
}

impl Config {
    /// Returns the task limit as an `Option` (`None` = unlimited).
    #[inline]
    pub fn task_limit(&self) -> Option<usize> {
        if self.max_tasks == 0 {
            None
        } else {
            Some(self.max_tasks)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration, sized for a battery-class device:
    ///
    /// - `tick = 200ms`
    /// - `recv_probe_period = 4s`, `send_probe_period = 1s`
    /// - `inbound_chunk = 16`
    /// - `max_tasks = 0` (unlimited), `bus_capacity = 1024`
    /// - default [`ConnectBackoffPolicy`] and [`LinkRetryPolicy`]
    /// - empty host address and identity (provisioning fills them in)
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(200),
            recv_probe_period: Duration::from_secs(4),
            send_probe_period: Duration::from_secs(1),
            inbound_chunk: 16,
            max_tasks: 0,
            bus_capacity: 1024,
            connect_backoff: ConnectBackoffPolicy::default(),
            link_retry: LinkRetryPolicy::default(),
            host_address: String::new(),
            identity: Identity::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_limit_sentinel() {
        let mut cfg = Config::default();
        assert_eq!(cfg.task_limit(), None);
        cfg.max_tasks = 4;
        assert_eq!(cfg.task_limit(), Some(4));
    }

    #[test]
    fn test_bus_capacity_clamped() {
        let mut cfg = Config::default();
        cfg.bus_capacity = 0;
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
