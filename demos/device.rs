//! # Demo: simulated messaging device
//!
//! Wires the orchestrator to an in-memory protocol client and link driver,
//! then walks the whole lifecycle: link-up → connect → authorize →
//! receive/send rotation → link loss → recovery → shutdown.
//!
//! ## Flow
//! ```text
//! t=0s    link driver reports link-up
//! t≈0.2s  connect + authorize succeed, session becomes operational
//! t≈2s    a message lands on the simulated host → receive probe fires
//! t≈4s    the device queues an outbound report → send probe fires
//! t=6s    the link drops; the loop resets to the link-down state
//! t≈6.2s  reconnect request → link restored → session re-established
//! t=10s   deliberate shutdown
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example device --features logging
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use linkvisor::{
    Config, Identity, InboundMessage, LinkDriver, LogWriter, Orchestrator, ProtocolClient,
    ProtocolError, SessionInfo, StateBits, Subscribe, TaskDescriptor,
};

/// In-memory protocol client: every operation succeeds, messages move
/// between a "host" queue and a local buffer.
#[derive(Default)]
struct SimClient {
    host_pending: Mutex<VecDeque<String>>,
    inbound: Mutex<VecDeque<String>>,
    outbound: Mutex<VecDeque<String>>,
}

impl SimClient {
    fn host_deliver(&self, payload: &str) {
        self.host_pending.lock().unwrap().push_back(payload.to_string());
    }

    fn queue_outbound(&self, payload: &str) {
        self.outbound.lock().unwrap().push_back(payload.to_string());
    }
}

#[async_trait]
impl ProtocolClient for SimClient {
    async fn connect(&self, address: &str) -> Result<(), ProtocolError> {
        println!("(sim) transport open to {address}");
        Ok(())
    }

    async fn disconnect(&self) {
        println!("(sim) transport closed");
    }

    fn reset_buffers(&self) {
        self.inbound.lock().unwrap().clear();
    }

    async fn authorize(&self, identity: &Identity) -> Result<SessionInfo, ProtocolError> {
        Ok(SessionInfo {
            session_id: format!("sid-{}", identity.device),
        })
    }

    async fn receive_pending(&self) -> Result<(), ProtocolError> {
        let mut pending = self.host_pending.lock().unwrap();
        self.inbound.lock().unwrap().extend(pending.drain(..));
        Ok(())
    }

    async fn send_pending(&self) -> Result<(), ProtocolError> {
        for payload in self.outbound.lock().unwrap().drain(..) {
            println!("(sim) sent to host: {payload}");
        }
        Ok(())
    }

    fn has_inbound(&self) -> bool {
        !self.host_pending.lock().unwrap().is_empty() || !self.inbound.lock().unwrap().is_empty()
    }

    fn has_outbound(&self) -> bool {
        !self.outbound.lock().unwrap().is_empty()
    }

    fn drain_inbound(
        &self,
        handler: &mut dyn FnMut(InboundMessage) -> bool,
        max: usize,
    ) -> usize {
        let mut inbound = self.inbound.lock().unwrap();
        let mut drained = 0;
        while drained < max {
            let payload = match inbound.pop_front() {
                Some(p) => p,
                None => break,
            };
            drained += 1;
            let keep_going = handler(InboundMessage {
                source: Some("host".into()),
                kind: "demo".into(),
                payload,
                id: None,
            });
            if !keep_going {
                break;
            }
        }
        drained
    }
}

/// Link driver that "associates" instantly when asked.
#[derive(Default)]
struct SimLink {
    orchestrator: Mutex<Weak<Orchestrator>>,
}

impl SimLink {
    fn attach(&self, orchestrator: &Arc<Orchestrator>) {
        *self.orchestrator.lock().unwrap() = Arc::downgrade(orchestrator);
    }
}

#[async_trait]
impl LinkDriver for SimLink {
    async fn request_connect(&self) {
        println!("(sim) link association requested");
        if let Some(orchestrator) = self.orchestrator.lock().unwrap().upgrade() {
            orchestrator.link_up();
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = Arc::new(SimClient::default());
    let link = Arc::new(SimLink::default());

    let mut cfg = Config::default();
    cfg.host_address = "https://demo-host.invalid".into();
    cfg.identity = Identity {
        user: "demo-user".into(),
        password: "demo-pass".into(),
        device: "24A16000CAFE".into(),
        metadata: Some(r#"{"model":"demo"}"#.into()),
    };
    // Snappier probes than the defaults, for a readable demo.
    cfg.recv_probe_period = Duration::from_millis(600);
    cfg.send_probe_period = Duration::from_millis(400);
    // Retry the link quickly so the mid-demo link loss recovers fast.
    cfg.link_retry.retry_delay = Duration::from_millis(400);

    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let orchestrator = Orchestrator::builder(
        cfg,
        Arc::clone(&client) as Arc<dyn ProtocolClient>,
        Arc::clone(&link) as Arc<dyn LinkDriver>,
    )
    .with_subscribers(subscribers)
    .with_inbound_handler(|msg: InboundMessage| {
        println!("(device) inbound message: {}", msg.payload);
        true
    })
    .build()?;
    link.attach(&orchestrator);

    // A user task: once authorized, queue a status report every 2s. The
    // request mask keeps it quiet while the session is down.
    const REPORT_DUE: StateBits = StateBits::user(0);
    let reporter = Arc::clone(&client);
    let report_no = AtomicBool::new(false);
    orchestrator.register_task(
        TaskDescriptor::new("status-report", Duration::from_secs(2))
            .request(StateBits::AUTHORIZED)
            .apply(REPORT_DUE)
            .on_sync(move |_id, state, register| {
                if state.contains(REPORT_DUE) {
                    register.clear(REPORT_DUE);
                    let first = !report_no.swap(true, Ordering::Relaxed);
                    reporter.queue_outbound(if first { "boot report" } else { "status ok" });
                }
                None
            }),
    )?;

    let handle = orchestrator.spawn();

    // Script the outside world.
    orchestrator.link_up();
    tokio::time::sleep(Duration::from_secs(2)).await;
    client.host_deliver("welcome to the demo host");
    tokio::time::sleep(Duration::from_secs(4)).await;
    println!("(sim) link dropped");
    orchestrator.link_down();
    tokio::time::sleep(Duration::from_secs(4)).await;

    orchestrator.shutdown();
    handle.await??;
    println!("(device) clean shutdown");
    Ok(())
}
