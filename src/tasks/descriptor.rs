//! # Periodic task descriptor.
//!
//! Defines [`TaskDescriptor`] — the configuration bundle for one periodic
//! trigger — and its hook types. A descriptor is inert until it carries at
//! least one hook or a non-empty apply mask; registration of an inert
//! descriptor is allowed (it simply never does anything observable).
//!
//! ## Firing contract
//! ```text
//! timer fires (timer context):
//!   if register.check(request):
//!     async hook present  → hook(id, &register)
//!     no async hook       → register.set(apply)
//!
//! each tick (main loop):
//!   if register.check(request | apply) and sync hook present:
//!     hook(id, snapshot, &register) → Some(new_period)?
//!                                     → stop → mutate → rearm
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::state::{StateBits, StateRegister};

/// Opaque identity of a registered task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(pub(crate) u32);

impl TaskId {
    /// The pool slot this id names. Ids are assigned sequentially in
    /// registration order.
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Hook fired on the **timer context**. Must be short and non-blocking;
/// anything heavier belongs in the sync hook or the main loop. The register
/// reference is the live shared register — flipping bits in it is how a
/// timer asks the main loop to act.
pub type AsyncHook = Arc<dyn Fn(TaskId, &StateRegister) + Send + Sync>;

/// Hook fired from the **main loop** with the state snapshot taken at its
/// gate check, plus the live register (for acknowledging apply bits or
/// raising new requests). Returning `Some(period)` reschedules the task's
/// timer to that period, effective for the next fire.
pub type SyncHook =
    Box<dyn FnMut(TaskId, StateBits, &StateRegister) -> Option<Duration> + Send + Sync>;

/// Configuration of one periodic trigger.
///
/// Per-task state (counters, device handles, channels) lives in the hook
/// closures' captures; descriptors carry no separate user-data slot.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use linkvisor::{StateBits, TaskDescriptor};
///
/// const SAMPLE_READY: StateBits = StateBits::user(0);
///
/// let task = TaskDescriptor::new("sensor", Duration::from_secs(5))
///     .request(StateBits::AUTHORIZED)
///     .apply(SAMPLE_READY)
///     .on_sync(|_id, state, register| {
///         assert!(state.contains(SAMPLE_READY));
///         register.clear(SAMPLE_READY); // acknowledge the trigger
///         None // keep the current period
///     });
/// assert!(!task.is_inert());
/// ```
pub struct TaskDescriptor {
    pub(crate) label: Cow<'static, str>,
    pub(crate) period: Duration,
    pub(crate) request: StateBits,
    pub(crate) apply: StateBits,
    pub(crate) async_hook: Option<AsyncHook>,
    pub(crate) sync_hook: Option<SyncHook>,
    pub(crate) id: TaskId,
}

impl TaskDescriptor {
    /// Creates a descriptor with the given diagnostic label and period.
    ///
    /// The request mask defaults to [`StateBits::EMPTY`] (always satisfied),
    /// the apply mask to empty, and no hooks are attached.
    pub fn new(label: impl Into<Cow<'static, str>>, period: Duration) -> Self {
        Self {
            label: label.into(),
            period,
            request: StateBits::EMPTY,
            apply: StateBits::EMPTY,
            async_hook: None,
            sync_hook: None,
            id: TaskId(0), // assigned by the pool on registration
        }
    }

    /// Sets the request mask: the timer only acts when **all** of these
    /// bits are set. An empty mask is always satisfied.
    #[must_use]
    pub fn request(mut self, mask: StateBits) -> Self {
        self.request = mask;
        self
    }

    /// Sets the apply mask: the bits ORed into the register on fire when no
    /// async hook is configured.
    #[must_use]
    pub fn apply(mut self, mask: StateBits) -> Self {
        self.apply = mask;
        self
    }

    /// Attaches the async hook (fired on the timer context).
    #[must_use]
    pub fn on_fire(
        mut self,
        hook: impl Fn(TaskId, &StateRegister) + Send + Sync + 'static,
    ) -> Self {
        self.async_hook = Some(Arc::new(hook));
        self
    }

    /// Attaches the sync hook (fired from the main loop).
    #[must_use]
    pub fn on_sync(
        mut self,
        hook: impl FnMut(TaskId, StateBits, &StateRegister) -> Option<Duration> + Send + Sync + 'static,
    ) -> Self {
        self.sync_hook = Some(Box::new(hook));
        self
    }

    /// The diagnostic label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The current timer period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// The id assigned at registration.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The mask gating the main-loop sync path: `request | apply`.
    pub(crate) fn sync_gate(&self) -> StateBits {
        self.request | self.apply
    }

    /// True if the descriptor can never have an observable effect: no hooks
    /// and nothing to apply.
    pub fn is_inert(&self) -> bool {
        self.async_hook.is_none() && self.sync_hook.is_none() && self.apply.is_empty()
    }
}

impl fmt::Debug for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDescriptor")
            .field("label", &self.label)
            .field("id", &self.id)
            .field("period", &self.period)
            .field("request", &self.request)
            .field("apply", &self.apply)
            .field("async_hook", &self.async_hook.is_some())
            .field("sync_hook", &self.sync_hook.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_descriptor_is_inert() {
        let d = TaskDescriptor::new("noop", Duration::from_secs(1));
        assert!(d.is_inert());
    }

    #[test]
    fn test_apply_mask_alone_is_not_inert() {
        let d = TaskDescriptor::new("bit-setter", Duration::from_secs(1))
            .apply(StateBits::user(2));
        assert!(!d.is_inert());
    }

    #[test]
    fn test_sync_gate_is_union_of_masks() {
        let d = TaskDescriptor::new("gated", Duration::from_secs(1))
            .request(StateBits::AUTHORIZED)
            .apply(StateBits::user(1));
        assert_eq!(d.sync_gate(), StateBits::AUTHORIZED | StateBits::user(1));
    }
}
