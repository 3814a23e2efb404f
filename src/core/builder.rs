//! # Orchestrator wiring.
//!
//! [`OrchestratorBuilder`] assembles the runtime: state register, event bus,
//! subscriber fan-out, the built-in probe tasks, and the main-loop driver.
//! `build()` must run inside a tokio runtime (it spawns the subscriber
//! listener) and is the `init` step of the crate's lifecycle — resource
//! failures are propagated, never retried.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::client::{InboundMessage, LinkDriver, NoopTimeSync, ProtocolClient, TimeSync};
use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::Bus;
use crate::state::{StateBits, StateRegister};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::{TaskDescriptor, TaskPool, TaskScheduler};

use super::connection::Connection;
use super::driver::{Driver, InboundHandler};
use super::orchestrator::Orchestrator;

/// Builder for constructing an [`Orchestrator`] with optional collaborators.
pub struct OrchestratorBuilder {
    cfg: Config,
    client: Arc<dyn ProtocolClient>,
    link: Arc<dyn LinkDriver>,
    time_sync: Arc<dyn TimeSync>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    inbound_handler: Option<InboundHandler>,
}

impl OrchestratorBuilder {
    /// Creates a new builder around the two mandatory collaborators.
    pub fn new(
        cfg: Config,
        client: Arc<dyn ProtocolClient>,
        link: Arc<dyn LinkDriver>,
    ) -> Self {
        Self {
            cfg,
            client,
            link,
            time_sync: Arc::new(NoopTimeSync),
            subscribers: Vec::new(),
            inbound_handler: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events through dedicated workers with
    /// bounded queues; see [`Subscribe`].
    #[must_use]
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the wall-clock synchronization collaborator (default: no-op).
    #[must_use]
    pub fn with_time_sync(mut self, time_sync: Arc<dyn TimeSync>) -> Self {
        self.time_sync = time_sync;
        self
    }

    /// Sets the handler the per-tick inbound drain feeds. Without one,
    /// drained messages are accepted and dropped.
    #[must_use]
    pub fn with_inbound_handler(
        mut self,
        handler: impl FnMut(InboundMessage) -> bool + Send + 'static,
    ) -> Self {
        self.inbound_handler = Some(Box::new(handler));
        self
    }

    /// Builds the orchestrator.
    ///
    /// Registers the two built-in queue probes (receive, send) as the first
    /// two pool entries, spawns the subscriber listener, and parks the
    /// driver until [`run`](Orchestrator::run)/[`spawn`](Orchestrator::spawn).
    ///
    /// Fails with [`RuntimeError::ResourceExhausted`] if the configured
    /// task limit cannot hold the built-in probes.
    pub fn build(self) -> Result<Arc<Orchestrator>, RuntimeError> {
        let state = Arc::new(StateRegister::new());
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let token = CancellationToken::new();

        if !self.subscribers.is_empty() {
            spawn_subscriber_listener(&bus, token.clone(), self.subscribers);
        }

        let mut pool = TaskPool::new(self.cfg.max_tasks);
        let recv_probe = {
            let client = Arc::clone(&self.client);
            let register = Arc::clone(&state);
            pool.push(
                TaskDescriptor::new("recv-probe", self.cfg.recv_probe_period)
                    .request(StateBits::HOST_CONNECTED)
                    .on_fire(move |_id, register| {
                        if client.has_inbound() {
                            register.set(StateBits::NEED_RECEIVE);
                        }
                    }),
            )?
        };
        let send_probe = {
            let client = Arc::clone(&self.client);
            let register = Arc::clone(&state);
            pool.push(
                TaskDescriptor::new("send-probe", self.cfg.send_probe_period)
                    .request(StateBits::HOST_CONNECTED)
                    .on_fire(move |_id, register| {
                        if client.has_outbound() {
                            register.set(StateBits::NEED_SEND);
                        }
                    }),
            )?
        };

        let connection = Connection::new(
            Arc::clone(&state),
            Arc::clone(&self.client),
            bus.clone(),
            self.cfg.connect_backoff,
            self.cfg.host_address.clone(),
            self.cfg.identity.clone(),
        );
        let scheduler = TaskScheduler::new(Arc::clone(&state), token.clone());

        let driver = Driver {
            cfg: self.cfg,
            state: Arc::clone(&state),
            bus: bus.clone(),
            client: self.client,
            link: self.link,
            time_sync: self.time_sync,
            connection,
            pool,
            scheduler,
            inbound_handler: self
                .inbound_handler
                .unwrap_or_else(|| Box::new(|_msg| true)),
            token: token.clone(),
            recv_probe: recv_probe.index(),
            send_probe: send_probe.index(),
        };

        Ok(Arc::new(Orchestrator {
            state,
            bus,
            token,
            driver: Mutex::new(Some(driver)),
        }))
    }
}

/// Forwards bus events to the subscriber set until the runtime token is
/// cancelled, then drains the set's worker queues.
fn spawn_subscriber_listener(bus: &Bus, token: CancellationToken, subs: Vec<Arc<dyn Subscribe>>) {
    let mut rx = bus.subscribe();
    let set = SubscriberSet::new(subs);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(&ev),
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        }
        set.shutdown().await;
    });
}
