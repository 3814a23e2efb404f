//! # Orchestrator: the host-facing handle.
//!
//! The [`Orchestrator`] owns the state register, the event bus, the runtime
//! cancellation token, and (until the loop starts) the main-loop driver. It
//! is the surface the host process talks to:
//!
//! - construction via [`Orchestrator::builder`];
//! - `run()` (call-in-place) or `spawn()` (detached) to start the loop;
//! - `shutdown()` to request deliberate teardown;
//! - `register_task()` during configuration;
//! - `link_up()` / `link_down()` for the link driver's notifications;
//! - `state()` / `subscribe()` for inspection.
//!
//! ## Link notifications
//! `link_up`/`link_down` only flip bits in the shared register — they are
//! safe from any context and never block. The heavier consequences (closing
//! the transport, adjusting counters) are carried out by the main loop on
//! its next tick, which is how link loss preempts an in-flight host
//! operation without cross-context locking.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::{LinkDriver, ProtocolClient};
use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::state::{Phase, StateBits, StateRegister};
use crate::tasks::{TaskDescriptor, TaskId};

use super::builder::OrchestratorBuilder;
use super::driver::Driver;

/// The session orchestrator handle.
///
/// Created once per process by [`Orchestrator::builder`]; lives until the
/// host tears it down. Cheap to share behind the `Arc` the builder returns.
pub struct Orchestrator {
    pub(crate) state: Arc<StateRegister>,
    pub(crate) bus: Bus,
    pub(crate) token: CancellationToken,
    pub(crate) driver: Mutex<Option<Driver>>,
}

impl Orchestrator {
    /// Starts building an orchestrator around the two mandatory
    /// collaborators.
    pub fn builder(
        cfg: Config,
        client: Arc<dyn ProtocolClient>,
        link: Arc<dyn LinkDriver>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg, client, link)
    }

    /// A snapshot of the condition register.
    pub fn state(&self) -> StateBits {
        self.state.get()
    }

    /// The coarse connectivity phase implied by the current flags.
    pub fn phase(&self) -> Phase {
        self.state.get().phase()
    }

    /// Subscribes a raw receiver to the event bus.
    ///
    /// For most hosts the [`Subscribe`](crate::Subscribe) seam on the
    /// builder is the better fit; a raw receiver is useful for tests and
    /// ad-hoc tooling.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Registers a periodic task. Configuration-time only: fails with
    /// [`RuntimeError::PoolSealed`] once the loop has started.
    pub fn register_task(&self, descriptor: TaskDescriptor) -> Result<TaskId, RuntimeError> {
        let mut slot = self.lock_driver();
        let driver = slot.as_mut().ok_or(RuntimeError::PoolSealed)?;
        let label = descriptor.label().to_string();
        let id = driver.pool.push(descriptor)?;
        self.bus
            .publish(Event::now(EventKind::TaskRegistered).with_task(label));
        Ok(id)
    }

    /// Runs the main loop in place, until shutdown or a fatal budget exit.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        match self.take_driver() {
            Some(driver) => driver.run().await,
            None => Err(RuntimeError::AlreadyRunning),
        }
    }

    /// Spawns the main loop onto the runtime and returns its join handle.
    pub fn spawn(&self) -> JoinHandle<Result<(), RuntimeError>> {
        let driver = self.take_driver();
        tokio::spawn(async move {
            match driver {
                Some(driver) => driver.run().await,
                None => Err(RuntimeError::AlreadyRunning),
            }
        })
    }

    /// Requests deliberate teardown: the loop exits at its next safe point,
    /// stops every timer, and runs the disconnect action.
    pub fn shutdown(&self) {
        self.bus.publish(Event::now(EventKind::ShutdownRequested));
        self.token.cancel();
    }

    /// Link-up notification from the link driver.
    ///
    /// Sets the link bit and requests a wall-clock sync (certificate
    /// validation needs sane time before the first host exchange).
    pub fn link_up(&self) {
        self.state
            .set(StateBits::LINK_UP | StateBits::NEED_TIME_SYNC);
        self.bus.publish(Event::now(EventKind::LinkUp));
    }

    /// Link-loss notification from the link driver.
    ///
    /// Clears the link bit and the whole session group in one atomic
    /// transition and raises the link-lost edge; the main loop consumes the
    /// edge on its next tick (transport close, counter bump, countdown
    /// reset). Idempotent.
    pub fn link_down(&self) {
        self.state.clear(StateBits::LINK_UP | StateBits::SESSION);
        self.state.set(StateBits::LINK_LOST);
        self.bus.publish(Event::now(EventKind::LinkDown));
    }

    fn take_driver(&self) -> Option<Driver> {
        self.lock_driver().take()
    }

    fn lock_driver(&self) -> std::sync::MutexGuard<'_, Option<Driver>> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}
