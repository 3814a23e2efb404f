//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//! This is primarily useful for development, debugging, and demos.
//!
//! ## Output format
//! ```text
//! [link-up]
//! [host-connected]
//! [connect-failed] err="transport error: refused" failures=3
//! [backoff] delay=30000ms failures=3
//! [authorized] session=9f2c01
//! [disconnected]
//! [budget-exhausted] reason="connect_budget_exhausted"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Prints human-readable event
/// descriptions to stdout; tick-boundary events (`StepBegin`/`StepEnd`) are
/// suppressed to keep the output readable at a 200 ms tick.
///
/// Not intended for production use — implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::StepBegin | EventKind::StepEnd => {}
            EventKind::LoopStarted => println!("[loop-started]"),
            EventKind::LoopFinished => println!("[loop-finished]"),
            EventKind::ShutdownRequested => println!("[shutdown-requested]"),
            EventKind::LinkUp => println!("[link-up]"),
            EventKind::LinkDown => println!("[link-down]"),
            EventKind::TimeSynced => println!("[time-synced]"),
            EventKind::HostConnected => println!("[host-connected]"),
            EventKind::ConnectFailed => {
                println!(
                    "[connect-failed] err={:?} failures={:?}",
                    e.reason, e.failures
                );
            }
            EventKind::BackoffScheduled => {
                println!("[backoff] delay={:?}ms failures={:?}", e.delay_ms, e.failures);
            }
            EventKind::Authorized => {
                println!("[authorized] session={:?}", e.session);
            }
            EventKind::SessionExpired => println!("[session-expired]"),
            EventKind::ProtocolErrorRaised => {
                println!("[protocol-error] err={:?}", e.reason);
            }
            EventKind::Disconnected => println!("[disconnected]"),
            EventKind::BudgetExhausted => {
                println!("[budget-exhausted] reason={:?}", e.reason);
            }
            EventKind::MessagesReceived => println!("[messages-received]"),
            EventKind::MessagesSent => println!("[messages-sent]"),
            EventKind::InboundDrainBegin => {}
            EventKind::InboundDrainEnd => {
                if e.count.unwrap_or(0) > 0 {
                    println!("[inbound-drained] count={:?}", e.count);
                }
            }
            EventKind::TaskRegistered => {
                println!("[task-registered] task={:?}", e.task);
            }
            EventKind::TaskRescheduled => {
                println!("[task-rescheduled] task={:?} period={:?}ms", e.task, e.delay_ms);
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
