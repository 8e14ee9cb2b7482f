//! # Async task unit.
//!
//! Schedules the callable onto the ambient tokio runtime's blocking
//! executor (descriptors carry synchronous callables, so
//! `Handle::spawn_blocking` is the platform executor for them). Completion
//! is signalled through a condvar latch so `wait` works from synchronous
//! contexts.
//!
//! Cancellation is cooperative: a requested stop only prevents future
//! submissions; in-flight work completes and its result reaches the
//! completion callback. Affinity is not supported.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio::runtime::Handle;
use tracing::error;

use crate::error::{ResultCode, SysResult, SystemError};
use crate::tasks::descriptor::TaskDescriptor;
use crate::tasks::unit::{ExecutionMode, TaskUnit};

static UNIT_ID: AtomicU64 = AtomicU64::new(1);

/// Task unit that executes on the tokio blocking pool.
pub struct AsyncTask<T: Clone + Send + 'static = ()> {
    handle: Handle,
    inner: Arc<Inner<T>>,
    id: u64,
}

impl<T: Clone + Send + 'static> std::fmt::Debug for AsyncTask<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncTask").field("id", &self.id).finish_non_exhaustive()
    }
}

struct Inner<T> {
    stop: AtomicBool,
    running: AtomicBool,
    has_task: AtomicBool,
    latch: Mutex<Latch<T>>,
    done_cond: Condvar,
}

struct Latch<T> {
    pending: bool,
    last: Option<SysResult<T>>,
}

impl<T: Clone + Send + 'static> AsyncTask<T> {
    /// Creates a unit bound to the current tokio runtime.
    ///
    /// Fails with `InvalidState` outside a runtime context.
    pub fn new() -> SysResult<Self> {
        let handle = Handle::try_current().map_err(|_| {
            SystemError::with(ResultCode::InvalidState, "no tokio runtime available")
        })?;
        Ok(Self::with_handle(handle))
    }

    /// Creates a unit bound to an explicit runtime handle.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            inner: Arc::new(Inner {
                stop: AtomicBool::new(false),
                running: AtomicBool::new(false),
                has_task: AtomicBool::new(false),
                latch: Mutex::new(Latch {
                    pending: false,
                    last: None,
                }),
                done_cond: Condvar::new(),
            }),
            id: UNIT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl<T: Clone + Send + 'static> TaskUnit<T> for AsyncTask<T> {
    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Async
    }

    fn init(&self) -> SysResult<()> {
        self.stop_wait_pending();
        self.inner.stop.store(false, Ordering::Relaxed);
        self.inner.running.store(false, Ordering::Relaxed);
        self.inner.has_task.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn execute(&self, desc: TaskDescriptor<T>) -> SysResult<()> {
        if self.inner.stop.load(Ordering::Relaxed) {
            return Err(SystemError::with(ResultCode::InvalidState, "unit stopped"));
        }
        let Some(func) = desc.func.clone() else {
            return Err(SystemError::with(
                ResultCode::InvalidArgument,
                "descriptor has no callable",
            ));
        };
        if self.inner.has_task.swap(true, Ordering::SeqCst) {
            return Err(SystemError::with(
                ResultCode::ResourceBusy,
                "async task already in flight",
            ));
        }

        self.inner.running.store(true, Ordering::Relaxed);
        self.inner.latch.lock().pending = true;

        let inner = Arc::clone(&self.inner);
        self.handle.spawn_blocking(move || {
            let result = catch_unwind(AssertUnwindSafe(|| func())).unwrap_or_else(|_| {
                error!(task = %desc.name, "task callable panicked");
                Err(SystemError::fail("task callable panicked"))
            });

            {
                let mut latch = inner.latch.lock();
                latch.last = Some(result.clone());
            }
            // completion callback runs outside the latch lock
            if let Some(cb) = &desc.on_complete {
                cb(&result);
            }

            inner.running.store(false, Ordering::Relaxed);
            inner.has_task.store(false, Ordering::Relaxed);
            let mut latch = inner.latch.lock();
            latch.pending = false;
            inner.done_cond.notify_all();
        });

        Ok(())
    }

    fn stop(&self) {
        self.inner.stop.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.inner.stop.load(Ordering::Relaxed)
    }

    fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Relaxed)
    }

    fn is_idle(&self) -> bool {
        !self.inner.has_task.load(Ordering::Relaxed)
    }

    fn wait(&self, timeout: Option<Duration>) -> SysResult<()> {
        let deadline = timeout.map(|d| Instant::now() + d);
        let mut latch = self.inner.latch.lock();
        loop {
            if !latch.pending {
                return Ok(());
            }
            match deadline {
                None => self.inner.done_cond.wait(&mut latch),
                Some(deadline) => {
                    if self
                        .inner
                        .done_cond
                        .wait_until(&mut latch, deadline)
                        .timed_out()
                    {
                        return Err(SystemError::with(ResultCode::Timeout, "async wait timeout"));
                    }
                }
            }
        }
    }

    fn join(&self) -> SysResult<()> {
        self.wait(None)
    }

    fn detach(&self) -> SysResult<()> {
        // blocking-pool tasks have no handle to keep; nothing to detach
        Ok(())
    }

    fn set_affinity(&self, _cores: &[usize]) -> SysResult<()> {
        Err(SystemError::with(
            ResultCode::NotSupported,
            "async unit does not support affinity",
        ))
    }

    fn unit_id(&self) -> u64 {
        self.id
    }

    fn result(&self) -> SysResult<T> {
        self.inner
            .latch
            .lock()
            .last
            .clone()
            .unwrap_or_else(|| Err(SystemError::with(ResultCode::InvalidState, "no result")))
    }
}

impl<T: Clone + Send + 'static> AsyncTask<T> {
    fn stop_wait_pending(&self) {
        let mut latch = self.inner.latch.lock();
        while latch.pending {
            self.inner.done_cond.wait(&mut latch);
        }
    }
}

impl<T: Clone + Send + 'static> Drop for AsyncTask<T> {
    fn drop(&mut self) {
        self.stop();
        // in-flight work owns an Arc of the latch; nothing to join here
    }
}
