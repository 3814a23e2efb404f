//! Error types used by the linkvisor runtime and the protocol client seam.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] — errors surfaced to the host by the orchestration
//!   runtime itself (setup failures and exhausted retry budgets).
//! - [`ProtocolError`] — errors raised by the external protocol client.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for
//! logging/metrics. [`ProtocolError::is_session_scoped`] is the classifier
//! that decides between local recovery (re-authorize) and a full disconnect.

use std::time::Duration;
use thiserror::Error;

/// # Errors surfaced by the orchestration runtime.
///
/// Setup-time failures are propagated to the caller of the failing call and
/// never retried. The two budget-exhausted classes are fatal to the whole
/// process: [`run`](crate::Orchestrator::run) returns them so the host can
/// restart the device instead of retrying past the ceiling.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A registration or init step could not allocate what it needs
    /// (task slot, timer, queue).
    #[error("resource exhausted: {what}")]
    ResourceExhausted {
        /// What ran out.
        what: String,
    },

    /// A task was registered after the main loop started; the pool is
    /// append-only during configuration and sealed afterwards.
    #[error("task pool is sealed; register tasks before the loop starts")]
    PoolSealed,

    /// `run`/`spawn` was called while the main loop is already running (or
    /// after it finished).
    #[error("the main loop is already running or has already run")]
    AlreadyRunning,

    /// Consecutive host-connect failures reached the hard ceiling.
    #[error("host connect retry budget exhausted after {failures} failures")]
    ConnectBudgetExhausted {
        /// The consecutive-failure count that tripped the ceiling.
        failures: u32,
    },

    /// Total link-down time reached the hard ceiling.
    #[error("offline budget exhausted after {offline:?} without a link")]
    OfflineBudgetExhausted {
        /// How long the link was continuously down.
        offline: Duration,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::ResourceExhausted { .. } => "resource_exhausted",
            RuntimeError::PoolSealed => "pool_sealed",
            RuntimeError::AlreadyRunning => "already_running",
            RuntimeError::ConnectBudgetExhausted { .. } => "connect_budget_exhausted",
            RuntimeError::OfflineBudgetExhausted { .. } => "offline_budget_exhausted",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::ResourceExhausted { what } => format!("resource exhausted: {what}"),
            RuntimeError::PoolSealed => "task pool sealed".to_string(),
            RuntimeError::AlreadyRunning => "main loop already running".to_string(),
            RuntimeError::ConnectBudgetExhausted { failures } => {
                format!("connect budget exhausted: failures={failures}")
            }
            RuntimeError::OfflineBudgetExhausted { offline } => {
                format!("offline budget exhausted: offline={offline:?}")
            }
        }
    }

    /// True for the two fatal budget classes that require an external
    /// restart rather than further local retries.
    pub fn is_budget_exhausted(&self) -> bool {
        matches!(
            self,
            RuntimeError::ConnectBudgetExhausted { .. }
                | RuntimeError::OfflineBudgetExhausted { .. }
        )
    }
}

/// # Errors produced by the external protocol client.
///
/// The orchestrator never inspects wire details; it only classifies an error
/// as **session-scoped** (the session expired server-side — re-authorize over
/// the live transport) or **fatal** (tear the transport down and fall back to
/// the reconnect path).
///
/// # Example
/// ```
/// use linkvisor::ProtocolError;
///
/// let expired = ProtocolError::SessionExpired;
/// assert!(expired.is_session_scoped());
///
/// let broken = ProtocolError::Transport { reason: "stream reset".into() };
/// assert!(!broken.is_session_scoped());
/// ```
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The host no longer knows this session; the transport itself is fine.
    #[error("no such session on host")]
    SessionExpired,

    /// The transport failed (connect refused, stream reset, timeout).
    #[error("transport error: {reason}")]
    Transport {
        /// The underlying failure description.
        reason: String,
    },

    /// The host rejected the request (bad credentials, forbidden operation).
    #[error("request rejected: {reason}")]
    Rejected {
        /// The host's rejection detail.
        reason: String,
    },

    /// Any other client-internal failure.
    #[error("client error: {reason}")]
    Internal {
        /// The underlying failure description.
        reason: String,
    },
}

impl ProtocolError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProtocolError::SessionExpired => "session_expired",
            ProtocolError::Transport { .. } => "transport_error",
            ProtocolError::Rejected { .. } => "rejected",
            ProtocolError::Internal { .. } => "client_error",
        }
    }

    /// True if the failure is scoped to the session only.
    ///
    /// Session-scoped errors trigger re-authorization over the existing
    /// transport; every other class tears the transport down.
    pub fn is_session_scoped(&self) -> bool {
        matches!(self, ProtocolError::SessionExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(
            RuntimeError::ConnectBudgetExhausted { failures: 12 }.as_label(),
            "connect_budget_exhausted"
        );
        assert_eq!(ProtocolError::SessionExpired.as_label(), "session_expired");
    }

    #[test]
    fn test_only_session_expired_is_session_scoped() {
        assert!(ProtocolError::SessionExpired.is_session_scoped());
        for err in [
            ProtocolError::Transport {
                reason: "reset".into(),
            },
            ProtocolError::Rejected {
                reason: "denied".into(),
            },
            ProtocolError::Internal {
                reason: "oom".into(),
            },
        ] {
            assert!(!err.is_session_scoped(), "{err} must be fatal");
        }
    }

    #[test]
    fn test_budget_classes_are_fatal() {
        assert!(RuntimeError::ConnectBudgetExhausted { failures: 12 }.is_budget_exhausted());
        assert!(RuntimeError::OfflineBudgetExhausted {
            offline: Duration::from_secs(900)
        }
        .is_budget_exhausted());
        assert!(!RuntimeError::PoolSealed.is_budget_exhausted());
    }
}
