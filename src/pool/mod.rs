//! # Priority-queued task pools.
//!
//! A pool is an Event-mode [`Worker`](crate::worker::Worker) dispatching a
//! priority queue over a fleet of task units:
//!
//! ```text
//! submit(desc, priority) ──► PendingQueue (max-heap + throttle map)
//!                                 │ event signal
//!                                 ▼
//!                         dispatch run() ──► idle unit ──► execute
//!                                 │ none idle
//!                                 └──► re-enqueue (priority += 10 × retry, ≤ 3)
//! ```
//!
//! ## Rules
//! - Strict priority order; FIFO within a priority.
//! - Queue overflow refuses with `ResourceBusy` and counts `dropped`.
//! - `Throttled` descriptors admit once per window per task name
//!   (`RateLimit` otherwise).
//! - Re-enqueued tasks outrank fresh arrivals of their original priority,
//!   so a starved task eventually wins.
//! - Individual task failures never stop the pool.

mod async_pool;
mod dispatch;
mod queue;
mod stats;
mod thread_pool;

pub use async_pool::{AsyncPool, AsyncPoolDescriptor};
pub use stats::{PoolStats, PoolStatsSnapshot};
pub use thread_pool::{ThreadPool, ThreadPoolDescriptor};

/// Priority added per re-enqueue attempt.
pub(crate) const RETRY_PRIORITY_BOOST: i32 = 10;
/// Re-enqueue attempts before a task is dropped.
pub(crate) const MAX_RETRY: u32 = 3;
/// Dispatcher breath between iterations when work remains.
pub(crate) const LOOP_SLEEP: std::time::Duration = std::time::Duration::from_millis(2);
