//! # Task execution units.
//!
//! A task unit is a one-shot execution primitive. Three variants realize
//! one capability set (start, execute, wait/join/detach, stop, query,
//! attribute control):
//!
//! | Variant | Where the callable runs | Affinity/sched |
//! |---------|-------------------------|----------------|
//! | [`SyncTask`]   | caller's context                      | not supported |
//! | [`AsyncTask`]  | tokio blocking executor               | not supported |
//! | [`ThreadTask`] | dedicated OS thread (condvar-parked)  | supported, self-healing |
//!
//! Work is described by a [`TaskDescriptor`]: a named callable with an
//! optional completion callback, a dispatch policy, affinity, an OS
//! scheduling policy, and a priority. Units accept one descriptor at a
//! time; a busy unit refuses with `ResourceBusy`.

mod asynch;
mod attrs;
mod descriptor;
mod sync;
mod thread;
mod unit;

pub use asynch::AsyncTask;
pub use descriptor::{DispatchPolicy, TaskBuilder, TaskDescriptor};
pub use sync::SyncTask;
pub use thread::ThreadTask;
pub use unit::{CompleteFn, ExecutionMode, TaskFn, TaskUnit};
