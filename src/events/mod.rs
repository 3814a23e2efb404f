//! Runtime events and the broadcast bus.
//!
//! Every lifecycle boundary the orchestrator crosses (loop and step edges,
//! connect/authorize outcomes, disconnects, protocol errors, task
//! reschedules) is published as a typed [`Event`] on the [`Bus`]. Observers
//! attach through the [`Subscribe`](crate::Subscribe) trait; the core never
//! calls host code directly.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
