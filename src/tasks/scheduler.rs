//! # Timer scheduler: bridges periodic timers to the state register.
//!
//! One timer task per registered descriptor, running on the shared timer
//! context (the tokio runtime). Each fire executes the **async fire path**:
//!
//! ```text
//! every `period`:
//!   if register.check(request):
//!     async hook present → hook(id, &register)   (short, non-blocking)
//!     no async hook      → register.set(apply)
//! ```
//!
//! ## Stop/rearm guarantees
//! Stopping a timer cancels its token **and awaits the timer task**, so the
//! stop is synchronous from the caller's point of view: once
//! [`TaskScheduler::stop`] returns, no further fire is observed, and any
//! mutation that follows happens-after the last fire. Period changes go
//! stop → mutate → rearm, never mutate-in-place.
//!
//! Timer tokens are children of the runtime token: cancelling the runtime
//! stops every timer without individual bookkeeping.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use std::sync::Arc;

use crate::state::StateRegister;
use crate::tasks::descriptor::TaskDescriptor;

/// Handle of one armed timer.
struct TimerSlot {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Owns the timer tasks for a pool of descriptors.
///
/// Slot `i` corresponds to pool index `i`; the driver is responsible for
/// keeping the two in step (it owns both).
pub(crate) struct TaskScheduler {
    state: Arc<StateRegister>,
    runtime_token: CancellationToken,
    slots: Vec<Option<TimerSlot>>,
}

impl TaskScheduler {
    /// Creates a scheduler with no armed timers.
    pub(crate) fn new(state: Arc<StateRegister>, runtime_token: CancellationToken) -> Self {
        Self {
            state,
            runtime_token,
            slots: Vec::new(),
        }
    }

    /// Arms one timer for the descriptor at pool index `index`.
    ///
    /// Must be called from within a tokio runtime. Replaces nothing: the
    /// slot must be empty (or beyond the current slot vector).
    pub(crate) fn arm(&mut self, index: usize, descriptor: &TaskDescriptor) {
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        debug_assert!(self.slots[index].is_none(), "slot {index} already armed");

        let cancel = self.runtime_token.child_token();
        let timer_token = cancel.clone();
        let state = Arc::clone(&self.state);
        let period = descriptor.period;
        let request = descriptor.request;
        let apply = descriptor.apply;
        let hook = descriptor.async_hook.clone();
        let id = descriptor.id;

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = timer_token.cancelled() => break,
                    _ = tokio::time::sleep(period) => {
                        if state.check(request) {
                            match &hook {
                                Some(hook) => hook(id, &state),
                                None => state.set(apply),
                            }
                        }
                    }
                }
            }
        });

        self.slots[index] = Some(TimerSlot { cancel, join });
    }

    /// Arms every descriptor of the pool, in order.
    pub(crate) fn arm_all(&mut self, pool: &crate::tasks::TaskPool) {
        for (index, descriptor) in pool.iter().enumerate() {
            self.arm(index, descriptor);
        }
    }

    /// Stops the timer at `index` and waits until its task has exited.
    ///
    /// Idempotent: stopping an unarmed slot is a no-op. After this returns,
    /// no further fire from the old timer can be observed.
    pub(crate) async fn stop(&mut self, index: usize) {
        let slot = match self.slots.get_mut(index).and_then(Option::take) {
            Some(slot) => slot,
            None => return,
        };
        slot.cancel.cancel();
        let _ = slot.join.await;
    }

    /// Stops and immediately rearms the timer at `index`, resetting its
    /// phase so the next fire lands a full period from now. Used after a
    /// completed receive/send exchange and after a period change.
    pub(crate) async fn rearm(&mut self, index: usize, descriptor: &TaskDescriptor) {
        self.stop(index).await;
        self.arm(index, descriptor);
    }

    /// Stops every timer. Idempotent; safe to call even if arming was
    /// partial.
    pub(crate) async fn teardown(&mut self) {
        for index in 0..self.slots.len() {
            self.stop(index).await;
        }
    }
}
