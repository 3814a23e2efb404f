//! # Connection state machine.
//!
//! Sequences link-up → host-connect → authorize → operational receive/send,
//! with error classification and backoff. Every step is driven from the main
//! loop; outcomes are written to the shared state register and published as
//! events.
//!
//! ## Transitions
//! ```text
//! HostConnecting:
//!   connect Ok   → HOST_CONNECTED | NEED_AUTHORIZE, counters reset
//!   connect Err  → failures += 1 → backoff ladder
//!                   ├─ Wait(d)  → retry countdown = d
//!                   └─ GiveUp   → fatal ConnectBudgetExhausted
//!
//! Authorizing:
//!   Ok                 → AUTHORIZED | NEED_RECEIVE, session cached
//!   session-scoped Err → session group cleared, transport kept
//!                        (back to HostConnecting; the next dial re-dials)
//!   other Err          → disconnect action
//!
//! Operational (receive/send/drain errors):
//!   session-scoped Err → drop AUTHORIZED, raise NEED_AUTHORIZE,
//!                        transport and HOST_CONNECTED kept
//!   other Err          → disconnect action
//! ```
//!
//! ## Disconnect action
//! Close the transport if it is open, otherwise just reset the client's
//! local buffers; then clear the whole session bit group in one atomic
//! transition. Safe to call repeatedly.

use std::sync::Arc;

use crate::client::{Identity, ProtocolClient};
use crate::error::{ProtocolError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::{BackoffDecision, ConnectBackoffPolicy};
use crate::state::{StateBits, StateRegister};

use super::context::ConnectionContext;

/// The connection machinery: collaborators, policies, and bookkeeping.
///
/// Owned by the driver; never touched from the timer context.
pub(crate) struct Connection {
    state: Arc<StateRegister>,
    client: Arc<dyn ProtocolClient>,
    bus: Bus,
    backoff: ConnectBackoffPolicy,
    host_address: String,
    identity: Identity,
    pub(crate) ctx: ConnectionContext,
}

impl Connection {
    pub(crate) fn new(
        state: Arc<StateRegister>,
        client: Arc<dyn ProtocolClient>,
        bus: Bus,
        backoff: ConnectBackoffPolicy,
        host_address: String,
        identity: Identity,
    ) -> Self {
        Self {
            state,
            client,
            bus,
            backoff,
            host_address,
            identity,
            ctx: ConnectionContext::new(),
        }
    }

    /// One gated connect attempt (the countdown has already elapsed).
    ///
    /// Resets the session first: a dial always starts from clean buffers
    /// and a closed transport.
    pub(crate) async fn connect_step(&mut self) -> Result<(), RuntimeError> {
        self.disconnect().await;

        match self.client.connect(&self.host_address).await {
            Ok(()) => {
                self.ctx.host_failures = 0;
                self.ctx.retry_delay = std::time::Duration::ZERO;
                self.ctx.transport_open = true;
                self.state
                    .set(StateBits::HOST_CONNECTED | StateBits::NEED_AUTHORIZE);
                self.bus.publish(Event::now(EventKind::HostConnected));
                Ok(())
            }
            Err(err) => {
                self.ctx.host_failures += 1;
                self.bus.publish(
                    Event::now(EventKind::ConnectFailed)
                        .with_reason(err.to_string())
                        .with_failures(self.ctx.host_failures),
                );

                match self.backoff.next(self.ctx.host_failures) {
                    BackoffDecision::Wait(delay) => {
                        self.ctx.retry_delay = delay;
                        self.bus.publish(
                            Event::now(EventKind::BackoffScheduled)
                                .with_delay(delay)
                                .with_failures(self.ctx.host_failures),
                        );
                        Ok(())
                    }
                    BackoffDecision::GiveUp => {
                        let failures = self.ctx.host_failures;
                        self.bus.publish(
                            Event::now(EventKind::BudgetExhausted)
                                .with_reason("connect_budget_exhausted")
                                .with_failures(failures),
                        );
                        Err(RuntimeError::ConnectBudgetExhausted { failures })
                    }
                }
            }
        }
    }

    /// One authorization round over the established transport.
    pub(crate) async fn authorize_step(&mut self) {
        match self.client.authorize(&self.identity).await {
            Ok(info) => {
                self.ctx.session = Some(Arc::from(info.session_id.as_str()));
                self.state.clear(StateBits::NEED_AUTHORIZE);
                // Prime an immediate receive: the host may hold messages
                // queued while we were away.
                self.state
                    .set(StateBits::AUTHORIZED | StateBits::NEED_RECEIVE);
                self.bus
                    .publish(Event::now(EventKind::Authorized).with_session(info.session_id));
            }
            Err(err) if err.is_session_scoped() => {
                // The session alone is invalid; keep the transport and fall
                // back to the connect path, which re-dials and re-authorizes.
                self.publish_protocol_error(&err);
                self.bus.publish(Event::now(EventKind::SessionExpired));
                self.state.clear_group(StateBits::SESSION);
                self.state.set(StateBits::NEED_AUTHORIZE);
            }
            Err(err) => {
                self.publish_protocol_error(&err);
                self.disconnect().await;
            }
        }
    }

    /// One pending-receive exchange. The request bit is cleared only on
    /// success; a failed exchange leaves it set for the next rotation.
    pub(crate) async fn receive_step(&mut self) {
        match self.client.receive_pending().await {
            Ok(()) => {
                self.state.clear(StateBits::NEED_RECEIVE);
                self.bus.publish(Event::now(EventKind::MessagesReceived));
            }
            Err(err) => self.consume_operational_error(err).await,
        }
    }

    /// One pending-send exchange. Same clearing rule as receive.
    pub(crate) async fn send_step(&mut self) {
        match self.client.send_pending().await {
            Ok(()) => {
                self.state.clear(StateBits::NEED_SEND);
                self.bus.publish(Event::now(EventKind::MessagesSent));
            }
            Err(err) => self.consume_operational_error(err).await,
        }
    }

    /// Classifies a protocol error observed while operational.
    pub(crate) async fn consume_operational_error(&mut self, err: ProtocolError) {
        self.publish_protocol_error(&err);
        if err.is_session_scoped() {
            self.bus.publish(Event::now(EventKind::SessionExpired));
            self.state.clear(StateBits::AUTHORIZED);
            self.state.set(StateBits::NEED_AUTHORIZE);
        } else {
            self.disconnect().await;
        }
    }

    /// The disconnect action: close the transport if one is open, otherwise
    /// reset the client's local buffers; then clear the session bit group
    /// atomically. Idempotent.
    pub(crate) async fn disconnect(&mut self) {
        if self.ctx.transport_open {
            self.client.disconnect().await;
            self.ctx.transport_open = false;
        } else {
            self.client.reset_buffers();
        }
        self.ctx.session = None;
        self.state.clear_group(StateBits::SESSION);
        self.bus.publish(Event::now(EventKind::Disconnected));
    }

    fn publish_protocol_error(&self, err: &ProtocolError) {
        self.bus.publish(
            Event::now(EventKind::ProtocolErrorRaised)
                .with_reason(format!("{}: {err}", err.as_label())),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::ScriptedClient;
    use crate::client::SessionInfo;
    use std::sync::atomic::Ordering;

    fn harness() -> (Arc<StateRegister>, Arc<ScriptedClient>, Connection) {
        let state = Arc::new(StateRegister::new());
        let client = Arc::new(ScriptedClient::new());
        let connection = Connection::new(
            Arc::clone(&state),
            Arc::clone(&client) as Arc<dyn ProtocolClient>,
            Bus::new(64),
            ConnectBackoffPolicy::default(),
            "https://host.example".to_string(),
            Identity {
                user: "user".into(),
                password: "secret".into(),
                device: "AABBCC".into(),
                metadata: None,
            },
        );
        (state, client, connection)
    }

    #[tokio::test]
    async fn test_connect_success_requests_authorization() {
        let (state, client, mut connection) = harness();
        state.set(StateBits::LINK_UP);

        connection
            .connect_step()
            .await
            .expect("connect is not fatal");

        assert!(state.check(StateBits::HOST_CONNECTED | StateBits::NEED_AUTHORIZE));
        assert!(connection.ctx.transport_open);
        assert_eq!(connection.ctx.host_failures, 0);
        assert_eq!(client.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_schedules_backoff() {
        let (state, client, mut connection) = harness();
        state.set(StateBits::LINK_UP);
        client.script_connect(
            (0..3)
                .map(|_| {
                    Err(ProtocolError::Transport {
                        reason: "refused".into(),
                    })
                })
                .collect(),
        );

        for expected in 1..=3u32 {
            connection.connect_step().await.expect("below the ceiling");
            // Backoff ladder: failures x 10s.
            assert_eq!(connection.ctx.host_failures, expected);
            assert_eq!(
                connection.ctx.retry_delay,
                std::time::Duration::from_secs(10 * u64::from(expected))
            );
            connection.ctx.retry_delay = std::time::Duration::ZERO; // re-open the gate
        }
    }

    #[tokio::test]
    async fn test_connect_hard_ceiling_is_fatal() {
        let (state, client, mut connection) = harness();
        state.set(StateBits::LINK_UP);
        connection.ctx.host_failures = 11;
        client.script_connect(vec![Err(ProtocolError::Transport {
            reason: "refused".into(),
        })]);

        let err = connection
            .connect_step()
            .await
            .expect_err("failure 12 must give up");
        assert!(matches!(
            err,
            RuntimeError::ConnectBudgetExhausted { failures: 12 }
        ));
    }

    #[tokio::test]
    async fn test_authorize_success_enters_operational() {
        let (state, _client, mut connection) = harness();
        state.set(StateBits::LINK_UP | StateBits::HOST_CONNECTED | StateBits::NEED_AUTHORIZE);
        connection.ctx.transport_open = true;

        connection.authorize_step().await;

        assert!(state.check(StateBits::AUTHORIZED | StateBits::NEED_RECEIVE));
        assert!(!state.check(StateBits::NEED_AUTHORIZE));
        assert_eq!(connection.ctx.session.as_deref(), Some("session-AABBCC"));
    }

    #[tokio::test]
    async fn test_authorize_session_rejection_keeps_transport() {
        let (state, client, mut connection) = harness();
        state.set(StateBits::LINK_UP | StateBits::HOST_CONNECTED | StateBits::NEED_AUTHORIZE);
        connection.ctx.transport_open = true;
        client.script_authorize(vec![Err(ProtocolError::SessionExpired)]);

        connection.authorize_step().await;

        // Back to host-connecting, re-auth pending, link untouched...
        assert!(!state.check(StateBits::HOST_CONNECTED));
        assert!(state.check(StateBits::LINK_UP | StateBits::NEED_AUTHORIZE));
        // ...and the transport was NOT torn down.
        assert_eq!(client.disconnects.load(Ordering::SeqCst), 0);
        assert!(connection.ctx.transport_open);
    }

    #[tokio::test]
    async fn test_authorize_fatal_error_disconnects() {
        let (state, client, mut connection) = harness();
        state.set(StateBits::LINK_UP | StateBits::HOST_CONNECTED | StateBits::NEED_AUTHORIZE);
        connection.ctx.transport_open = true;
        client.script_authorize(vec![Err(ProtocolError::Rejected {
            reason: "bad credentials".into(),
        })]);

        connection.authorize_step().await;

        assert_eq!(state.get(), StateBits::LINK_UP);
        assert_eq!(client.disconnects.load(Ordering::SeqCst), 1);
        assert!(!connection.ctx.transport_open);
    }

    #[tokio::test]
    async fn test_session_error_while_operational_requests_reauth() {
        let (state, client, mut connection) = harness();
        state.set(
            StateBits::LINK_UP
                | StateBits::HOST_CONNECTED
                | StateBits::AUTHORIZED
                | StateBits::NEED_RECEIVE,
        );
        connection.ctx.transport_open = true;
        client.script_receive(vec![Err(ProtocolError::SessionExpired)]);

        connection.receive_step().await;

        assert!(!state.check(StateBits::AUTHORIZED));
        assert!(state.check(StateBits::HOST_CONNECTED | StateBits::NEED_AUTHORIZE));
        assert_eq!(client.disconnects.load(Ordering::SeqCst), 0);
        // The receive bit survives a failed exchange.
        assert!(state.check(StateBits::NEED_RECEIVE));
    }

    #[tokio::test]
    async fn test_fatal_error_while_operational_disconnects_once() {
        let (state, client, mut connection) = harness();
        state.set(
            StateBits::LINK_UP
                | StateBits::HOST_CONNECTED
                | StateBits::AUTHORIZED
                | StateBits::NEED_SEND,
        );
        connection.ctx.transport_open = true;
        client.script_send(vec![Err(ProtocolError::Transport {
            reason: "stream reset".into(),
        })]);

        connection.send_step().await;
        assert_eq!(state.get(), StateBits::LINK_UP);
        assert_eq!(client.disconnects.load(Ordering::SeqCst), 1);

        // Idempotence: a second pass through the disconnect path only
        // resets buffers; the transport is closed exactly once.
        connection.disconnect().await;
        assert_eq!(client.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(client.buffer_resets.load(Ordering::SeqCst), 1);
        assert_eq!(state.get(), StateBits::LINK_UP);
    }

    #[tokio::test]
    async fn test_successful_exchanges_clear_their_bits() {
        let (state, client, mut connection) = harness();
        state.set(
            StateBits::LINK_UP
                | StateBits::HOST_CONNECTED
                | StateBits::AUTHORIZED
                | StateBits::NEED_RECEIVE
                | StateBits::NEED_SEND,
        );
        connection.ctx.transport_open = true;

        connection.receive_step().await;
        assert!(!state.check(StateBits::NEED_RECEIVE));
        assert!(state.check(StateBits::NEED_SEND));

        connection.send_step().await;
        assert!(!state.check(StateBits::NEED_SEND));
        assert_eq!(client.receive_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.send_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_authorize_uses_scripted_session() {
        let (_state, client, mut connection) = harness();
        connection.ctx.transport_open = true;
        client.script_authorize(vec![Ok(SessionInfo {
            session_id: "abc123".into(),
        })]);

        connection.authorize_step().await;
        assert_eq!(connection.ctx.session.as_deref(), Some("abc123"));
    }
}
