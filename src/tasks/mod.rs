//! Periodic tasks: descriptors, the ordered pool, and the timer scheduler.
//!
//! A [`TaskDescriptor`] couples a period with two bitmasks over the
//! [`StateRegister`](crate::StateRegister) and up to two hooks:
//!
//! - the **async hook** fires on the timer context when the request mask is
//!   satisfied (or, absent a hook, the apply mask is ORed into the register);
//! - the **sync hook** fires from the main loop when the request|apply mask
//!   is satisfied, sees a full state snapshot, and may request a new period.
//!
//! The [`TaskPool`] keeps descriptors in registration order (the sync
//! inspection order); the [`TaskScheduler`] owns one timer task per
//! descriptor and guarantees stop-before-rearm when periods change.

mod descriptor;
mod pool;
mod scheduler;

pub use descriptor::{AsyncHook, SyncHook, TaskDescriptor, TaskId};
pub use pool::TaskPool;
pub(crate) use scheduler::TaskScheduler;
