//! # Async pool.
//!
//! The same dispatcher as the thread pool, over a fleet of [`AsyncTask`]
//! units. No pinning: the tokio blocking pool owns placement. The dispatch
//! worker is still an OS thread, so the pool needs a runtime handle at
//! construction.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::info;

use crate::error::{ResultCode, SysResult, SystemError};
use crate::events::{Bus, Event, EventKind};
use crate::pool::dispatch::run_dispatch;
use crate::pool::queue::PendingQueue;
use crate::pool::stats::{PoolStats, PoolStatsSnapshot};
use crate::tasks::{AsyncTask, TaskDescriptor, TaskUnit};
use crate::worker::{Work, Worker, WorkerContext, WorkerDescriptor, WorkerType};

/// Construction parameters for an [`AsyncPool`].
#[derive(Debug, Clone)]
pub struct AsyncPoolDescriptor {
    /// Concurrent async units; 0 falls back to the core count.
    pub async_count: usize,
    /// Pending-queue capacity.
    pub max_queue: usize,
}

impl Default for AsyncPoolDescriptor {
    fn default() -> Self {
        Self {
            async_count: std::thread::available_parallelism().map_or(1, |n| n.get()),
            max_queue: 128,
        }
    }
}

struct AsyncPoolCore {
    desc: AsyncPoolDescriptor,
    handle: Handle,
    queue: Mutex<PendingQueue>,
    fleet: Mutex<Vec<Arc<AsyncTask<()>>>>,
    stats: PoolStats,
    bus: Option<Bus>,
}

impl AsyncPoolCore {
    fn candidates(&self) -> Vec<Arc<dyn TaskUnit<()>>> {
        self.fleet
            .lock()
            .iter()
            .map(|u| Arc::clone(u) as Arc<dyn TaskUnit<()>>)
            .collect()
    }
}

impl Work for AsyncPoolCore {
    fn run(&self, cx: &WorkerContext) -> SysResult<()> {
        run_dispatch(
            cx,
            "async-pool",
            &self.queue,
            &self.stats,
            self.bus.as_ref(),
            &|_desc| self.candidates(),
        )
    }

    fn on_pre_start(&self) -> SysResult<()> {
        let mut fleet = self.fleet.lock();
        fleet.clear();

        let total = if self.desc.async_count != 0 {
            self.desc.async_count
        } else {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        };
        info!(total, max_queue = self.desc.max_queue, "async pool starting units");

        for _ in 0..total {
            let unit = Arc::new(AsyncTask::<()>::with_handle(self.handle.clone()));
            unit.init()?;
            fleet.push(unit);
        }
        Ok(())
    }

    fn on_post_stop(&self) {
        let mut fleet = self.fleet.lock();
        for unit in fleet.iter() {
            unit.stop();
        }
        fleet.clear();
        self.queue.lock().clear();
    }
}

/// Priority-queue dispatcher over tokio-backed async units.
pub struct AsyncPool {
    core: Arc<AsyncPoolCore>,
    worker: Worker,
}

impl std::fmt::Debug for AsyncPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncPool").finish_non_exhaustive()
    }
}

impl AsyncPool {
    /// Pool bound to the current tokio runtime.
    pub fn new(desc: AsyncPoolDescriptor) -> SysResult<Self> {
        let handle = Handle::try_current().map_err(|_| {
            SystemError::with(ResultCode::InvalidState, "no tokio runtime available")
        })?;
        Self::build(desc, handle, None)
    }

    /// Pool bound to an explicit runtime handle.
    pub fn with_handle(desc: AsyncPoolDescriptor, handle: Handle) -> SysResult<Self> {
        Self::build(desc, handle, None)
    }

    /// Pool that publishes drop events on the platform bus.
    pub fn with_bus(desc: AsyncPoolDescriptor, handle: Handle, bus: Bus) -> SysResult<Self> {
        Self::build(desc, handle, Some(bus))
    }

    fn build(desc: AsyncPoolDescriptor, handle: Handle, bus: Option<Bus>) -> SysResult<Self> {
        let max_queue = desc.max_queue;
        let core = Arc::new(AsyncPoolCore {
            desc,
            handle,
            queue: Mutex::new(PendingQueue::new(max_queue)),
            fleet: Mutex::new(Vec::new()),
            stats: PoolStats::default(),
            bus,
        });
        let worker = Worker::new();
        worker.init(
            WorkerDescriptor {
                name: "async-pool".into(),
                kind: WorkerType::Event,
                ..WorkerDescriptor::default()
            },
            Arc::clone(&core) as Arc<dyn Work>,
        )?;
        Ok(Self { core, worker })
    }

    pub fn start(&self) -> SysResult<()> {
        self.worker.start()
    }

    pub fn stop(&self) -> SysResult<()> {
        self.worker.stop()
    }

    /// Admits one descriptor at the given priority.
    pub fn submit(&self, desc: TaskDescriptor<()>, priority: i32) -> SysResult<()> {
        let name = desc.name.clone();
        match self.core.queue.lock().admit(desc, priority) {
            Ok(()) => {
                self.worker.event();
                Ok(())
            }
            Err(e) => {
                if e.code() == ResultCode::ResourceBusy {
                    self.core.stats.record_dropped();
                    if let Some(bus) = &self.core.bus {
                        bus.publish(Event::now(EventKind::PoolTaskDropped).with_name(name));
                    }
                }
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        self.core.stats.snapshot()
    }

    pub fn queued(&self) -> usize {
        self.core.queue.lock().len()
    }
}

impl Drop for AsyncPool {
    fn drop(&mut self) {
        let _ = self.worker.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskBuilder;
    use std::sync::mpsc;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn executes_submissions() {
        let pool = AsyncPool::new(AsyncPoolDescriptor {
            async_count: 2,
            max_queue: 16,
        })
        .unwrap();
        pool.start().unwrap();

        let (tx, rx) = mpsc::channel();
        for i in 0..4 {
            let tx = tx.clone();
            pool.submit(
                TaskBuilder::<()>::new(format!("job-{i}"))
                    .func(move || {
                        tx.send(i).ok();
                        Ok(())
                    })
                    .build()
                    .unwrap(),
                0,
            )
            .unwrap();
        }

        let received = tokio::task::spawn_blocking(move || {
            (0..4)
                .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
                .count()
        })
        .await
        .unwrap();
        assert_eq!(received, 4);
        assert_eq!(pool.stats().executed, 4);
        pool.stop().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn overflow_is_refused() {
        let pool = AsyncPool::new(AsyncPoolDescriptor {
            async_count: 1,
            max_queue: 1,
        })
        .unwrap();
        // not started: the queue holds submissions
        pool.submit(
            TaskBuilder::<()>::new("a").func(|| Ok(())).build().unwrap(),
            0,
        )
        .unwrap();
        let err = pool
            .submit(
                TaskBuilder::<()>::new("b").func(|| Ok(())).build().unwrap(),
                0,
            )
            .unwrap_err();
        assert_eq!(err.code(), ResultCode::ResourceBusy);
        assert_eq!(pool.stats().dropped, 1);
    }

    #[test]
    fn requires_a_runtime() {
        let err = AsyncPool::new(AsyncPoolDescriptor::default()).unwrap_err();
        assert_eq!(err.code(), ResultCode::InvalidState);
    }
}
