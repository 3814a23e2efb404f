//! Observer seam: the [`Subscribe`] trait and the non-blocking fan-out set.
//!
//! The orchestrator publishes typed events on its bus; a single listener
//! forwards them to a [`SubscriberSet`], which delivers to each subscriber
//! through a dedicated bounded queue and worker. The host never receives raw
//! callbacks from the core's hot path.

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
