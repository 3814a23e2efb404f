//! # linkvisor
//!
//! **Linkvisor** is a device-side session orchestrator for clients that must
//! keep a layered connectivity state alive — network link → host session →
//! authorization → message exchange — while servicing user-defined periodic
//! tasks from a single cooperative loop.
//!
//! It provides the state register, the timer/task bridge, and the
//! connection state machine with retry backoff and fatal-restart policy.
//! Everything that touches a wire lives behind collaborator traits; the
//! crate is a building block for device firmware hosts and their simulators.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   timer context (tokio timers)             main-loop context (one task)
//!  ┌───────────────────────────┐            ┌───────────────────────────────┐
//!  │ recv probe ──┐            │            │ Driver::run(), once per tick: │
//!  │ send probe ──┼─ set bits ─┼──────────► │  1. time sync if requested    │
//!  │ user tasks ──┘            │            │  2. authorize / receive /     │
//!  └──────────────┬────────────┘            │     drain inbound / send      │
//!                 ▼                         │  3. gated connect attempt     │
//!        ┌────────────────┐   check/set/clr │  4. link retry + budgets      │
//!        │ StateRegister  │◄────────────────│  5. pool sync fire path       │
//!        │  (AtomicU32)   │                 │  6. sleep(tick)               │
//!        └────────────────┘                 └──────────────┬────────────────┘
//!                 ▲                                        │ drives
//!   link_up()/link_down() notifications         ┌──────────┴───────────┐
//!   (from the host's link driver)               │ Connection (machine) │
//!                                               │  connect/authorize/  │
//!                                               │  receive/send/       │
//!                                               │  classify/disconnect │
//!                                               └──────────┬───────────┘
//!                                                          ▼
//!                                               ProtocolClient (trait)
//!
//!   every component ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                              (per-subscriber
//!                                                               queues+workers)
//! ```
//!
//! ### Connectivity lifecycle
//! ```text
//! LinkDown ── link_up() ──► LinkUp (time sync)
//!    ▲                          │
//!    │                          ▼
//!    │                  HostConnecting ◄────────────┐
//!    │                          │ connect ok        │ session-scoped
//!    │                          ▼                   │ error during
//!    │                    Authorizing ──────────────┘ authorize
//!    │                          │ authorize ok        (transport kept)
//!    │                          ▼
//!    │                    Operational ──► receive/send rotation,
//!    │                          │         bounded inbound drain
//!    │   link_down() /          │ session-scoped error → re-authorize
//!    └── fatal protocol error ◄─┘ other error → disconnect action
//!
//! Budgets: connect failures ride a linear ladder (n × unit) to a soft
//! ceiling (long cooldown), then a hard ceiling (fatal). Continuous offline
//! time has its own fatal ceiling. Fatal = run() returns Err for the host
//! to restart the process.
//! ```
//!
//! ## Features
//! | Area            | Description                                                  | Key types / traits                          |
//! |-----------------|--------------------------------------------------------------|---------------------------------------------|
//! | **State**       | Atomic condition register shared across contexts.            | [`StateRegister`], [`StateBits`], [`Phase`] |
//! | **Tasks**       | Periodic triggers bridging timers to state bits and hooks.   | [`TaskDescriptor`], [`TaskId`]              |
//! | **Connection**  | Link/host/session state machine with typed error classes.    | [`Orchestrator`], [`ProtocolError`]         |
//! | **Policies**    | Connect backoff ladder, link retry, jitter.                  | [`ConnectBackoffPolicy`], [`LinkRetryPolicy`], [`JitterPolicy`] |
//! | **Collaborators** | Seams the host implements.                                 | [`ProtocolClient`], [`LinkDriver`], [`TimeSync`] |
//! | **Observability** | Typed events fanned out to subscriber hooks.               | [`Event`], [`EventKind`], [`Subscribe`]     |
//! | **Errors**      | Setup, budget, and protocol error taxonomy.                  | [`RuntimeError`], [`ProtocolError`]         |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use linkvisor::{
//!     Config, Identity, Orchestrator, StateBits, TaskDescriptor,
//! };
//! # use linkvisor::{LinkDriver, ProtocolClient};
//! # fn collaborators() -> (Arc<dyn ProtocolClient>, Arc<dyn LinkDriver>) { unimplemented!() }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (client, link) = collaborators();
//!
//!     let mut cfg = Config::default();
//!     cfg.host_address = "https://host.example".into();
//!     cfg.identity = Identity {
//!         user: "device-fleet".into(),
//!         password: "secret".into(),
//!         device: "24A16000CAFE".into(),
//!         metadata: None,
//!     };
//!
//!     let orchestrator = Orchestrator::builder(cfg, client, link).build()?;
//!
//!     // A user task: sample a sensor every 5s once the session is live.
//!     const SAMPLE_READY: StateBits = StateBits::user(0);
//!     orchestrator.register_task(
//!         TaskDescriptor::new("sensor", Duration::from_secs(5))
//!             .request(StateBits::AUTHORIZED)
//!             .apply(SAMPLE_READY)
//!             .on_sync(|_id, state, register| {
//!                 assert!(state.contains(SAMPLE_READY));
//!                 register.clear(SAMPLE_READY);
//!                 // read the sensor, queue an outbound message ...
//!                 None
//!             }),
//!     )?;
//!
//!     // The link driver calls orchestrator.link_up()/link_down() as the
//!     // link changes; run() drives everything else.
//!     orchestrator.run().await?;
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod core;
mod error;
mod events;
mod policies;
mod state;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use client::{
    Identity, InboundMessage, LinkDriver, NoopTimeSync, ProtocolClient, SessionInfo, TimeSync,
};
pub use config::Config;
pub use core::{Orchestrator, OrchestratorBuilder};
pub use error::{ProtocolError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffDecision, ConnectBackoffPolicy, JitterPolicy, LinkRetryPolicy};
pub use state::{Phase, StateBits, StateRegister};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{AsyncHook, SyncHook, TaskDescriptor, TaskId, TaskPool};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
