//! # Collaborator contracts.
//!
//! The orchestrator is a library invoked by a host process; everything that
//! touches a wire or a radio lives behind the traits in this module:
//!
//! - [`ProtocolClient`] — the message-exchange client (connect, authorize,
//!   receive/send, inbound queue inspection). All of its operations are
//!   driven synchronously-to-completion from the main loop; only the cheap
//!   queue probes (`has_inbound`/`has_outbound`) are called from the timer
//!   context.
//! - [`LinkDriver`] — the network-link driver. The core asks it to
//!   (re)connect; the driver reports link transitions back by calling
//!   [`Orchestrator::link_up`](crate::Orchestrator::link_up) /
//!   [`link_down`](crate::Orchestrator::link_down).
//! - [`TimeSync`] — one-shot wall-clock synchronization, performed once per
//!   link-up before host work starts (TLS verification needs sane time).
//!
//! Error outcomes ride in `Result<_, ProtocolError>`; the classifier
//! ([`ProtocolError::is_session_scoped`]) decides between re-authorization
//! and a full disconnect.

use async_trait::async_trait;

use crate::error::ProtocolError;

/// Credentials and identity submitted during authorization.
///
/// Provisioning (out of scope here) fills these in before the loop starts;
/// `metadata` is an opaque blob forwarded to the host untouched.
#[derive(Clone, Debug, Default)]
pub struct Identity {
    /// Account name on the host.
    pub user: String,
    /// Account password.
    pub password: String,
    /// Stable device identity (e.g. a MAC-derived string).
    pub device: String,
    /// Opaque device metadata forwarded verbatim (the core never parses it).
    pub metadata: Option<String>,
}

/// Result of a successful authorization round.
#[derive(Clone, Debug)]
pub struct SessionInfo {
    /// Host-issued session identity.
    pub session_id: String,
}

/// One buffered inbound message, handed to the host's drain handler.
///
/// The payload is opaque to the core — parsing and framing belong to the
/// protocol client and the host.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    /// Originating device/user, if the client knows it.
    pub source: Option<String>,
    /// Message kind discriminator.
    pub kind: String,
    /// Opaque payload.
    pub payload: String,
    /// Host-assigned message id, if any.
    pub id: Option<u64>,
}

/// The wire-protocol client the orchestrator drives.
///
/// Implementations own the transport, the session, and both message queues.
/// The blocking operations (`connect`, `authorize`, `receive_pending`,
/// `send_pending`, `disconnect`) are awaited to completion from the main
/// loop — the core never holds locks across them. The probe methods must be
/// cheap and callable from the timer context.
#[async_trait]
pub trait ProtocolClient: Send + Sync + 'static {
    /// Establishes a transport to `address`.
    async fn connect(&self, address: &str) -> Result<(), ProtocolError>;

    /// Closes the transport. Must be safe to call on a closed transport.
    async fn disconnect(&self);

    /// Resets local buffers without touching the transport.
    fn reset_buffers(&self);

    /// Submits identity and credentials over the established transport.
    async fn authorize(&self, identity: &Identity) -> Result<SessionInfo, ProtocolError>;

    /// Fetches host-pending inbound messages into the local buffer.
    async fn receive_pending(&self) -> Result<(), ProtocolError>;

    /// Flushes locally queued outbound messages to the host.
    async fn send_pending(&self) -> Result<(), ProtocolError>;

    /// True if inbound messages are pending for this device — advertised by
    /// the host or already sitting in the local buffer. Drives the built-in
    /// receive probe.
    ///
    /// Called from the timer context; must not block.
    fn has_inbound(&self) -> bool;

    /// True if outbound messages are queued locally. Drives the built-in
    /// send probe.
    ///
    /// Called from the timer context; must not block.
    fn has_outbound(&self) -> bool;

    /// Hands up to `max` already-buffered inbound messages to `handler`,
    /// in arrival order. A handler returning `false` stops the drain early.
    /// Returns how many messages were handed over.
    fn drain_inbound(
        &self,
        handler: &mut dyn FnMut(InboundMessage) -> bool,
        max: usize,
    ) -> usize;
}

/// The network-link driver seam.
///
/// The core invokes [`request_connect`](LinkDriver::request_connect) while
/// the link is down (gated by [`LinkRetryPolicy`](crate::LinkRetryPolicy));
/// the driver reports resulting transitions back through the orchestrator's
/// `link_up`/`link_down` notifications.
#[async_trait]
pub trait LinkDriver: Send + Sync + 'static {
    /// Asks the driver to (re)establish the link. Fire-and-forget: the
    /// outcome arrives later as a link-up or link-down notification.
    async fn request_connect(&self);
}

/// Wall-clock synchronization seam.
///
/// Ran once per link-up, before any host exchange, because certificate
/// validation needs a sane clock.
#[async_trait]
pub trait TimeSync: Send + Sync + 'static {
    /// Synchronizes the wall clock. Errors are the implementation's to
    /// handle; the core clears the request either way.
    async fn sync(&self);
}

/// A [`TimeSync`] that does nothing, for hosts whose clock is already
/// managed elsewhere.
pub struct NoopTimeSync;

#[async_trait]
impl TimeSync for NoopTimeSync {
    async fn sync(&self) {}
}

/// Scripted in-memory collaborators shared by the state-machine and driver
/// tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A [`ProtocolClient`] whose outcomes are scripted per operation.
    ///
    /// Each operation pops the next scripted result; an empty script means
    /// success. Call counters let tests assert exact interaction counts.
    #[derive(Default)]
    pub(crate) struct ScriptedClient {
        pub(crate) connect_script: Mutex<VecDeque<Result<(), ProtocolError>>>,
        pub(crate) authorize_script: Mutex<VecDeque<Result<SessionInfo, ProtocolError>>>,
        pub(crate) receive_script: Mutex<VecDeque<Result<(), ProtocolError>>>,
        pub(crate) send_script: Mutex<VecDeque<Result<(), ProtocolError>>>,
        /// Messages pending on the host side; `receive_pending` moves them
        /// into the local buffer.
        pub(crate) host_pending: Mutex<VecDeque<InboundMessage>>,
        /// Locally buffered messages consumed by `drain_inbound`.
        pub(crate) inbound: Mutex<VecDeque<InboundMessage>>,
        pub(crate) outbound_waiting: AtomicBool,
        pub(crate) connects: AtomicUsize,
        pub(crate) disconnects: AtomicUsize,
        pub(crate) buffer_resets: AtomicUsize,
        pub(crate) authorize_calls: AtomicUsize,
        pub(crate) receive_calls: AtomicUsize,
        pub(crate) send_calls: AtomicUsize,
    }

    impl ScriptedClient {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn script_connect(&self, results: Vec<Result<(), ProtocolError>>) {
            self.connect_script.lock().unwrap().extend(results);
        }

        pub(crate) fn script_authorize(
            &self,
            results: Vec<Result<SessionInfo, ProtocolError>>,
        ) {
            self.authorize_script.lock().unwrap().extend(results);
        }

        pub(crate) fn script_receive(&self, results: Vec<Result<(), ProtocolError>>) {
            self.receive_script.lock().unwrap().extend(results);
        }

        pub(crate) fn script_send(&self, results: Vec<Result<(), ProtocolError>>) {
            self.send_script.lock().unwrap().extend(results);
        }

        /// Queues a message on the simulated host side.
        pub(crate) fn queue_inbound(&self, payload: &str) {
            self.host_pending.lock().unwrap().push_back(InboundMessage {
                source: None,
                kind: "test".to_string(),
                payload: payload.to_string(),
                id: None,
            });
        }
    }

    #[async_trait]
    impl ProtocolClient for ScriptedClient {
        async fn connect(&self, _address: &str) -> Result<(), ProtocolError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.connect_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        }

        async fn disconnect(&self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }

        fn reset_buffers(&self) {
            self.buffer_resets.fetch_add(1, Ordering::SeqCst);
        }

        async fn authorize(&self, identity: &Identity) -> Result<SessionInfo, ProtocolError> {
            self.authorize_calls.fetch_add(1, Ordering::SeqCst);
            self.authorize_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Ok(SessionInfo {
                        session_id: format!("session-{}", identity.device),
                    })
                })
        }

        async fn receive_pending(&self) -> Result<(), ProtocolError> {
            self.receive_calls.fetch_add(1, Ordering::SeqCst);
            let outcome = self
                .receive_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()));
            if outcome.is_ok() {
                let mut pending = self.host_pending.lock().unwrap();
                self.inbound.lock().unwrap().extend(pending.drain(..));
            }
            outcome
        }

        async fn send_pending(&self) -> Result<(), ProtocolError> {
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            self.outbound_waiting.store(false, Ordering::SeqCst);
            self.send_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        }

        fn has_inbound(&self) -> bool {
            !self.host_pending.lock().unwrap().is_empty()
                || !self.inbound.lock().unwrap().is_empty()
        }

        fn has_outbound(&self) -> bool {
            self.outbound_waiting.load(Ordering::SeqCst)
        }

        fn drain_inbound(
            &self,
            handler: &mut dyn FnMut(InboundMessage) -> bool,
            max: usize,
        ) -> usize {
            let mut queue = self.inbound.lock().unwrap();
            let mut drained = 0;
            while drained < max {
                let msg = match queue.pop_front() {
                    Some(msg) => msg,
                    None => break,
                };
                drained += 1;
                if !handler(msg) {
                    break;
                }
            }
            drained
        }
    }

    /// A [`LinkDriver`] that records reconnect requests.
    #[derive(Default)]
    pub(crate) struct RecordingLink {
        pub(crate) connect_requests: AtomicUsize,
    }

    #[async_trait]
    impl LinkDriver for RecordingLink {
        async fn request_connect(&self) {
            self.connect_requests.fetch_add(1, Ordering::SeqCst);
        }
    }
}
