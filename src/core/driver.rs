//! # The cooperative main loop.
//!
//! A single-threaded, fixed-tick loop. Each tick, in this exact order:
//!
//! ```text
//! 0. consume a pending link-loss edge (takes precedence over everything)
//! 1. link up  + time-sync requested   → sync wall clock once, clear bit
//! 2. link up  + host connected        → authorize | receive rotation,
//!                                       bounded inbound drain, send step
//! 3. link up  + host not connected    → countdown-gated connect attempt
//! 4. link down                        → link retry policy + offline budget
//! 5. pool sync fire path (registration order)
//! 6. sleep one tick (cancellable)
//! ```
//!
//! The loop never exits under normal operation. The two exit paths are
//! cancellation of the runtime token (deliberate shutdown → `Ok`) and an
//! exhausted retry budget (→ `Err`, for the host to restart the process).
//!
//! All blocking-style collaborator calls happen here, driven to completion
//! before the tick proceeds; no locks are held across them.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{InboundMessage, LinkDriver, ProtocolClient, TimeSync};
use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::state::{StateBits, StateRegister};
use crate::tasks::{TaskPool, TaskScheduler};

use super::connection::Connection;

/// Handler for messages handed over by the per-tick inbound drain.
/// Returning `false` stops the current drain early.
pub(crate) type InboundHandler = Box<dyn FnMut(InboundMessage) -> bool + Send>;

/// The main-loop driver. Owns everything the loop touches; constructed by
/// the [`OrchestratorBuilder`](crate::OrchestratorBuilder) and consumed by
/// `run`.
pub(crate) struct Driver {
    pub(crate) cfg: Config,
    pub(crate) state: Arc<StateRegister>,
    pub(crate) bus: Bus,
    pub(crate) client: Arc<dyn ProtocolClient>,
    pub(crate) link: Arc<dyn LinkDriver>,
    pub(crate) time_sync: Arc<dyn TimeSync>,
    pub(crate) connection: Connection,
    pub(crate) pool: TaskPool,
    pub(crate) scheduler: TaskScheduler,
    pub(crate) inbound_handler: InboundHandler,
    pub(crate) token: CancellationToken,
    /// Pool index of the built-in inbound-queue probe.
    pub(crate) recv_probe: usize,
    /// Pool index of the built-in outbound-queue probe.
    pub(crate) send_probe: usize,
}

impl Driver {
    /// Runs the loop to completion.
    ///
    /// On the deliberate-shutdown path the session is torn down and
    /// [`EventKind::LoopFinished`] is published. On a fatal budget exit the
    /// timers are still stopped, but the session is left to the restarting
    /// host.
    pub(crate) async fn run(mut self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::now(EventKind::LoopStarted));
        self.scheduler.arm_all(&self.pool);

        let result = self.drive().await;

        self.scheduler.teardown().await;
        if result.is_ok() {
            self.connection.disconnect().await;
            self.bus.publish(Event::now(EventKind::LoopFinished));
        }
        result
    }

    async fn drive(&mut self) -> Result<(), RuntimeError> {
        let tick = self.cfg.tick;

        loop {
            if self.token.is_cancelled() {
                return Ok(());
            }
            self.bus
                .publish(Event::now(EventKind::StepBegin).with_state(self.state.get()));

            // A link-loss notification cleared the bits already; consume the
            // edge before any step so it takes precedence over whatever was
            // in flight.
            if self.state.check(StateBits::LINK_LOST) {
                self.state.clear(StateBits::LINK_LOST);
                self.connection.ctx.link_failures += 1;
                self.connection.ctx.retry_delay = Duration::ZERO;
                self.connection.disconnect().await;
                // A link that flapped back up between ticks is a fresh link:
                // the disconnect above wiped the sync request it raised.
                if self.state.check(StateBits::LINK_UP) {
                    self.state.set(StateBits::NEED_TIME_SYNC);
                }
            }

            if self.state.check(StateBits::LINK_UP) {
                self.connection.ctx.offline = Duration::ZERO;
                self.connection.ctx.link_failures = 0;

                if self.state.check(StateBits::NEED_TIME_SYNC) {
                    self.time_sync.sync().await;
                    self.state.clear(StateBits::NEED_TIME_SYNC);
                    self.bus.publish(Event::now(EventKind::TimeSynced));
                }

                if self.state.check(StateBits::HOST_CONNECTED) {
                    self.host_steps().await;
                } else if self.connection.ctx.tick_retry_gate(tick) {
                    self.connection.connect_step().await?;
                }
            } else {
                self.link_down_steps(tick).await?;
            }

            self.sync_fire_tasks().await;

            self.bus
                .publish(Event::now(EventKind::StepEnd).with_state(self.state.get()));

            tokio::select! {
                _ = tokio::time::sleep(tick) => {}
                _ = self.token.cancelled() => return Ok(()),
            }
        }
    }

    /// Tick steps while the host is connected: authorize-or-receive, the
    /// unconditional bounded inbound drain, then send.
    ///
    /// Each step may disconnect (fatal protocol error), so the connected
    /// bit is re-checked before the later steps of the same tick.
    async fn host_steps(&mut self) {
        if self.state.check(StateBits::NEED_AUTHORIZE) {
            self.connection.authorize_step().await;
        } else if self.state.check(StateBits::NEED_RECEIVE) {
            self.connection.receive_step().await;
            // The next probe lands a full period after the exchange.
            self.scheduler
                .rearm(self.recv_probe, self.pool.get(self.recv_probe))
                .await;
        }

        if self.cfg.inbound_chunk > 0 && self.state.check(StateBits::HOST_CONNECTED) {
            self.bus.publish(Event::now(EventKind::InboundDrainBegin));
            let client = Arc::clone(&self.client);
            let drained =
                client.drain_inbound(&mut *self.inbound_handler, self.cfg.inbound_chunk);
            self.bus.publish(
                Event::now(EventKind::InboundDrainEnd).with_count(drained as u32),
            );
        }

        if self
            .state
            .check(StateBits::HOST_CONNECTED | StateBits::NEED_SEND)
        {
            self.connection.send_step().await;
            self.scheduler
                .rearm(self.send_probe, self.pool.get(self.send_probe))
                .await;
        }
    }

    /// Tick steps while the link is down: accumulate the offline budget and
    /// issue countdown-gated reconnect requests to the link driver.
    async fn link_down_steps(&mut self, tick: Duration) -> Result<(), RuntimeError> {
        self.connection.ctx.offline += tick;
        let offline = self.connection.ctx.offline;
        if self.cfg.link_retry.offline_exhausted(offline) {
            self.bus.publish(
                Event::now(EventKind::BudgetExhausted).with_reason("offline_budget_exhausted"),
            );
            return Err(RuntimeError::OfflineBudgetExhausted { offline });
        }

        let gate_open = self.connection.ctx.tick_retry_gate(tick);
        if gate_open && self.connection.ctx.link_failures > 0 {
            self.connection.ctx.link_failures = 0;
            self.connection.ctx.retry_delay = self.cfg.link_retry.retry_delay;
            self.link.request_connect().await;
        }
        Ok(())
    }

    /// The pool sync fire path: for every descriptor whose `request|apply`
    /// mask is satisfied, invoke the sync hook with a state snapshot; a
    /// requested period change goes stop → mutate → rearm.
    async fn sync_fire_tasks(&mut self) {
        for index in 0..self.pool.len() {
            let gate = self.pool.get(index).sync_gate();
            if !self.state.check(gate) {
                continue;
            }

            let snapshot = self.state.get();
            let current_period = self.pool.get(index).period();
            let register = Arc::clone(&self.state);
            let requested = {
                let descriptor = self.pool.get_mut(index);
                let id = descriptor.id();
                match descriptor.sync_hook.as_mut() {
                    Some(hook) => hook(id, snapshot, &register),
                    None => None,
                }
            };

            if let Some(new_period) = requested {
                if new_period != current_period {
                    self.scheduler.stop(index).await;
                    self.pool.get_mut(index).period = new_period;
                    self.scheduler.arm(index, self.pool.get(index));
                    self.bus.publish(
                        Event::now(EventKind::TaskRescheduled)
                            .with_task(self.pool.get(index).label().to_string())
                            .with_delay(new_period),
                    );
                }
            }
        }
    }
}
