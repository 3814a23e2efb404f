//! # Runtime events emitted by the orchestrator.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Loop events**: loop/step boundaries of the cooperative driver
//! - **Connectivity events**: link, transport, and session transitions
//! - **Exchange events**: receive/send rotation and inbound draining
//! - **Task events**: registration and rescheduling of periodic tasks
//!
//! The [`Event`] struct carries additional metadata such as timestamps, task
//! labels, failure counters, delays, and a state-register snapshot.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use linkvisor::{Event, EventKind};
//!
//! let ev = Event::now(EventKind::BackoffScheduled)
//!     .with_failures(3)
//!     .with_delay(Duration::from_secs(30));
//!
//! assert_eq!(ev.kind, EventKind::BackoffScheduled);
//! assert_eq!(ev.failures, Some(3));
//! assert_eq!(ev.delay_ms, Some(30_000));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::state::StateBits;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Loop events ===
    /// The main loop has started.
    ///
    /// Sets: `at`, `seq`.
    LoopStarted,

    /// The main loop has finished (deliberate shutdown path).
    ///
    /// Sets: `at`, `seq`.
    LoopFinished,

    /// A tick is beginning.
    ///
    /// Sets: `state` (register snapshot), `at`, `seq`.
    StepBegin,

    /// A tick has ended.
    ///
    /// Sets: `state` (register snapshot), `at`, `seq`.
    StepEnd,

    /// Shutdown was requested by the host.
    ///
    /// Sets: `at`, `seq`.
    ShutdownRequested,

    // === Connectivity events ===
    /// The link driver reported the link up.
    ///
    /// Sets: `at`, `seq`.
    LinkUp,

    /// The link driver reported the link down.
    ///
    /// Sets: `at`, `seq`.
    LinkDown,

    /// Wall-clock synchronization completed.
    ///
    /// Sets: `at`, `seq`.
    TimeSynced,

    /// A transport to the host was established.
    ///
    /// Sets: `at`, `seq`.
    HostConnected,

    /// A connect attempt failed.
    ///
    /// Sets: `reason`, `failures` (consecutive count), `at`, `seq`.
    ConnectFailed,

    /// The next connect attempt was scheduled after a failure.
    ///
    /// Sets: `delay_ms`, `failures`, `at`, `seq`.
    BackoffScheduled,

    /// The session was authorized.
    ///
    /// Sets: `session` (session id), `at`, `seq`.
    Authorized,

    /// The host reported the session unknown/expired (session-scoped error).
    ///
    /// Sets: `at`, `seq`.
    SessionExpired,

    /// The protocol client reported an error (any class).
    ///
    /// Sets: `reason` (error label + detail), `at`, `seq`.
    ProtocolErrorRaised,

    /// The disconnect action ran (transport closed or buffers reset).
    ///
    /// Sets: `at`, `seq`.
    Disconnected,

    /// A retry budget (connect failures or offline time) was exhausted.
    ///
    /// Sets: `reason` (which budget), `at`, `seq`.
    BudgetExhausted,

    // === Exchange events ===
    /// A pending-receive exchange completed successfully.
    ///
    /// Sets: `at`, `seq`.
    MessagesReceived,

    /// A pending-send exchange completed successfully.
    ///
    /// Sets: `at`, `seq`.
    MessagesSent,

    /// A bounded inbound drain is beginning.
    ///
    /// Sets: `at`, `seq`.
    InboundDrainBegin,

    /// A bounded inbound drain ended.
    ///
    /// Sets: `count` (messages handed to the handler), `at`, `seq`.
    InboundDrainEnd,

    // === Task events ===
    /// A periodic task was registered.
    ///
    /// Sets: `task` (label), `at`, `seq`.
    TaskRegistered,

    /// A task's timer was rearmed with a new period requested by its
    /// synchronous hook.
    ///
    /// Sets: `task` (label), `delay_ms` (new period), `at`, `seq`.
    TaskRescheduled,
}

/// Runtime event with optional metadata.
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

    /// Task label, if applicable.
    pub task: Option<Arc<str>>,
    /// Human-readable reason (errors, budget names, etc.).
    pub reason: Option<Arc<str>>,
    /// Session identity (set on `Authorized`).
    pub session: Option<Arc<str>>,
    /// Delay or period in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Consecutive-failure counter, where relevant.
    pub failures: Option<u32>,
    /// Message count for drain events.
    pub count: Option<u32>,
    /// State-register snapshot at publish time.
    pub state: Option<StateBits>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// the next global sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            reason: None,
            session: None,
            delay_ms: None,
            failures: None,
            count: None,
            state: None,
        }
    }

    /// Attaches a task label.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a session identity.
    #[inline]
    pub fn with_session(mut self, session: impl Into<Arc<str>>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Attaches a delay or period (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a consecutive-failure count.
    #[inline]
    pub fn with_failures(mut self, n: u32) -> Self {
        self.failures = Some(n);
        self
    }

    /// Attaches a message count.
    #[inline]
    pub fn with_count(mut self, n: u32) -> Self {
        self.count = Some(n);
        self
    }

    /// Attaches a state-register snapshot.
    #[inline]
    pub fn with_state(mut self, state: StateBits) -> Self {
        self.state = Some(state);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::now(EventKind::StepBegin);
        let b = Event::now(EventKind::StepEnd);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_builders_attach_metadata() {
        let ev = Event::now(EventKind::ConnectFailed)
            .with_reason("transport error: refused")
            .with_failures(4)
            .with_state(StateBits::LINK_UP);

        assert_eq!(ev.reason.as_deref(), Some("transport error: refused"));
        assert_eq!(ev.failures, Some(4));
        assert_eq!(ev.state, Some(StateBits::LINK_UP));
        assert!(ev.task.is_none());
    }

    #[test]
    fn test_delay_saturates_at_u32_millis() {
        let ev = Event::now(EventKind::BackoffScheduled)
            .with_delay(Duration::from_secs(u64::from(u32::MAX)));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
