//! # Task unit capability set.
//!
//! [`TaskUnit`] is the common contract of all execution variants. Units are
//! neither movable between owners nor clonable; fleets own them directly.
//!
//! ## Rules
//! - `execute` on a busy unit returns `ResourceBusy`.
//! - `execute` with an empty callable returns `InvalidArgument`.
//! - `stop` is idempotent and only prevents future submissions; in-flight
//!   work completes and reaches the completion callback.
//! - `wait` with a deadline returns `Timeout` when it elapses first.

use std::time::Duration;

use crate::error::SysResult;
use crate::tasks::descriptor::TaskDescriptor;

/// How a unit executes its callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sync,
    Async,
    Thread,
}

/// Shared callable payload of a descriptor.
///
/// `Fn`, not `FnOnce`: a descriptor may be re-submitted (pools re-enqueue on
/// contention), so every execution draws a fresh call from the same closure.
pub type TaskFn<T> = std::sync::Arc<dyn Fn() -> SysResult<T> + Send + Sync>;

/// Completion callback, invoked with the execution result outside the unit's
/// task lock.
pub type CompleteFn<T> = std::sync::Arc<dyn Fn(&SysResult<T>) + Send + Sync>;

/// One-shot execution primitive.
pub trait TaskUnit<T: Clone + Send + 'static>: Send + Sync {
    /// The unit's execution variant.
    fn execution_mode(&self) -> ExecutionMode;

    /// Prepares the unit for submissions (spawns the owned thread for the
    /// thread variant). Idempotence is variant-specific.
    fn init(&self) -> SysResult<()>;

    /// Submits one descriptor for execution.
    fn execute(&self, desc: TaskDescriptor<T>) -> SysResult<()>;

    /// Requests a cooperative stop. Idempotent; never interrupts a running
    /// callable. Must not be called from the unit's own owned thread.
    fn stop(&self);

    fn is_stopped(&self) -> bool;
    fn is_running(&self) -> bool;
    fn is_idle(&self) -> bool;

    /// Waits for the current submission to complete. `None` waits forever.
    fn wait(&self, timeout: Option<Duration>) -> SysResult<()>;

    /// Joins the underlying execution context, when there is one.
    fn join(&self) -> SysResult<()>;

    /// Detaches the underlying execution context, when there is one.
    fn detach(&self) -> SysResult<()>;

    /// Binds execution to the given CPU cores. Only meaningful for the
    /// thread variant; others return `NotSupported`.
    fn set_affinity(&self, cores: &[usize]) -> SysResult<()>;

    /// Stable unit identifier (for fleet indexing and log tags).
    fn unit_id(&self) -> u64;

    /// Last successfully applied scheduling policy (0 = default).
    fn policy(&self) -> i32 {
        0
    }

    /// Last successfully applied priority (0 = default).
    fn priority(&self) -> i32 {
        0
    }

    /// Last completed result, when one exists.
    fn result(&self) -> SysResult<T>;
}
