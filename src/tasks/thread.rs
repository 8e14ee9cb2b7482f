//! # Thread-backed task unit.
//!
//! Owns one dedicated OS thread parked on a condition variable. `execute`
//! hands over a descriptor and wakes the thread; the thread runs the
//! callable, records the result under the result lock, invokes the
//! completion callback **outside** the task lock, then signals completion.
//!
//! ## Rules
//! - One pending descriptor at a time: `has_task` set → `ResourceBusy`.
//!   (A unit may hold one pending descriptor while the previous one still
//!   runs; `is_idle` reports the pending slot, not the running state.)
//! - Attribute changes ride the desired/applied/dirty protocol in
//!   [`attrs`](super::attrs); failed syscalls retry on the next submission.
//! - Panics in the callable are caught, logged, and recorded as `Fail`.
//! - Dropping from any thread but the owned one joins; dropping on the
//!   owned thread detaches to avoid self-join deadlock.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::os::unix::thread::JoinHandleExt;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

use crate::error::{ResultCode, SysResult, SystemError};
use crate::tasks::attrs::ThreadAttrs;
use crate::tasks::descriptor::TaskDescriptor;
use crate::tasks::unit::{ExecutionMode, TaskUnit};

static UNIT_ID: AtomicU64 = AtomicU64::new(1);

/// Task unit backed by one dedicated OS thread.
pub struct ThreadTask<T: Clone + Send + 'static = ()> {
    inner: Arc<Inner<T>>,
    control: Mutex<Control>,
    id: u64,
}

struct Control {
    handle: Option<JoinHandle<()>>,
    thread_id: Option<ThreadId>,
    pthread: Option<libc::pthread_t>,
}

struct Inner<T> {
    stop: AtomicBool,
    running: AtomicBool,
    has_task: AtomicBool,
    task_running: AtomicBool,
    /// Pending descriptor + attribute state. The two condvars below are
    /// only ever used with this mutex.
    slot: Mutex<Slot<T>>,
    work_cond: Condvar,
    done_cond: Condvar,
    result: Mutex<Option<SysResult<T>>>,
}

struct Slot<T> {
    desc: Option<TaskDescriptor<T>>,
    attrs: ThreadAttrs,
}

impl<T: Clone + Send + 'static> Default for ThreadTask<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> ThreadTask<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                stop: AtomicBool::new(false),
                running: AtomicBool::new(false),
                has_task: AtomicBool::new(false),
                task_running: AtomicBool::new(false),
                slot: Mutex::new(Slot {
                    desc: None,
                    attrs: ThreadAttrs::default(),
                }),
                work_cond: Condvar::new(),
                done_cond: Condvar::new(),
                result: Mutex::new(None),
            }),
            control: Mutex::new(Control {
                handle: None,
                thread_id: None,
                pthread: None,
            }),
            id: UNIT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Last successfully applied affinity, sorted and deduplicated.
    pub fn affinity(&self) -> Vec<usize> {
        let slot = self.inner.slot.lock();
        let mut cores = slot.attrs.affinity().to_vec();
        cores.sort_unstable();
        cores.dedup();
        cores
    }

    fn apply_attrs_if_dirty(&self) {
        let pthread = self.control.lock().pthread;
        if let Some(pthread) = pthread {
            self.inner.slot.lock().attrs.apply_if_dirty(pthread);
        }
    }

    fn worker_loop(inner: &Inner<T>) {
        inner.running.store(true, Ordering::Relaxed);
        'outer: loop {
            let desc = {
                let mut slot = inner.slot.lock();
                loop {
                    if inner.stop.load(Ordering::Relaxed) {
                        break 'outer;
                    }
                    if inner.has_task.load(Ordering::Relaxed) {
                        break;
                    }
                    inner.work_cond.wait(&mut slot);
                }
                inner.has_task.store(false, Ordering::Relaxed);
                inner.task_running.store(true, Ordering::Relaxed);
                slot.desc.take()
            };

            if let Some(desc) = desc {
                if let Some(func) = desc.func.clone() {
                    let result = catch_unwind(AssertUnwindSafe(|| func())).unwrap_or_else(|_| {
                        error!(task = %desc.name, "task callable panicked");
                        Err(SystemError::fail("task callable panicked"))
                    });
                    *inner.result.lock() = Some(result.clone());
                    // completion callback runs outside the task lock
                    if let Some(cb) = &desc.on_complete {
                        cb(&result);
                    }
                }
            }

            {
                let _slot = inner.slot.lock();
                inner.task_running.store(false, Ordering::Relaxed);
                inner.has_task.store(false, Ordering::Relaxed);
                inner.done_cond.notify_all();
            }
        }
        inner.running.store(false, Ordering::Relaxed);
        let _slot = inner.slot.lock();
        inner.task_running.store(false, Ordering::Relaxed);
        inner.done_cond.notify_all();
    }
}

impl<T: Clone + Send + 'static> TaskUnit<T> for ThreadTask<T> {
    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Thread
    }

    fn init(&self) -> SysResult<()> {
        let mut control = self.control.lock();
        if control.handle.is_some() {
            return Err(SystemError::with(
                ResultCode::InvalidState,
                "thread already initialized",
            ));
        }
        self.inner.stop.store(false, Ordering::Relaxed);
        self.inner.has_task.store(false, Ordering::Relaxed);
        self.inner.task_running.store(false, Ordering::Relaxed);

        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name(format!("task-unit-{}", self.id))
            .spawn(move || Self::worker_loop(&inner))
            .map_err(|e| SystemError::fail(format!("thread spawn failed: {e}")))?;

        #[cfg(unix)]
        {
            control.pthread = Some(handle.as_pthread_t());
        }
        control.thread_id = Some(handle.thread().id());
        control.handle = Some(handle);
        Ok(())
    }

    fn execute(&self, desc: TaskDescriptor<T>) -> SysResult<()> {
        debug!(task = %desc.name, unit = self.id, "execute");
        if self.inner.stop.load(Ordering::Relaxed) {
            return Err(SystemError::with(ResultCode::InvalidState, "unit stopped"));
        }
        if self.control.lock().handle.is_none() && !self.inner.running.load(Ordering::Relaxed) {
            return Err(SystemError::with(
                ResultCode::InvalidState,
                "unit not initialized",
            ));
        }
        if desc.func.is_none() {
            return Err(SystemError::with(
                ResultCode::InvalidArgument,
                "descriptor has no callable",
            ));
        }

        {
            let mut slot = self.inner.slot.lock();
            if self.inner.has_task.load(Ordering::Relaxed) {
                return Err(SystemError::with(
                    ResultCode::ResourceBusy,
                    "unit already has a pending task",
                ));
            }
            slot.attrs.update_desired(&desc);
            slot.desc = Some(desc);
            self.inner.has_task.store(true, Ordering::Relaxed);
        }

        self.apply_attrs_if_dirty();
        let _slot = self.inner.slot.lock();
        self.inner.work_cond.notify_one();
        Ok(())
    }

    fn stop(&self) {
        self.inner.stop.store(true, Ordering::SeqCst);
        let _slot = self.inner.slot.lock();
        self.inner.work_cond.notify_all();
        self.inner.done_cond.notify_all();
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
        let mut slot = self.inner.slot.lock();
        loop {
            let busy = self.inner.task_running.load(Ordering::Relaxed)
                || self.inner.has_task.load(Ordering::Relaxed);
            if !busy {
                return Ok(());
            }
            match deadline {
                None => self.inner.done_cond.wait(&mut slot),
                Some(deadline) => {
                    if self.inner.done_cond.wait_until(&mut slot, deadline).timed_out() {
                        return Err(SystemError::with(
                            ResultCode::Timeout,
                            "thread wait timeout",
                        ));
                    }
                }
            }
        }
    }

    fn join(&self) -> SysResult<()> {
        let handle = {
            let mut control = self.control.lock();
            if let Some(id) = control.thread_id {
                if thread::current().id() == id {
                    return Err(SystemError::with(
                        ResultCode::InvalidState,
                        "join from the owned thread",
                    ));
                }
            }
            control.handle.take()
        };
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| SystemError::fail("owned thread panicked"))?;
        }
        Ok(())
    }

    fn detach(&self) -> SysResult<()> {
        self.control.lock().handle.take();
        Ok(())
    }

    fn set_affinity(&self, cores: &[usize]) -> SysResult<()> {
        let pthread = self.control.lock().pthread.ok_or_else(|| {
            SystemError::with(ResultCode::InvalidState, "unit not initialized")
        })?;

        let mut slot = self.inner.slot.lock();
        if !slot.attrs.request_affinity(cores) {
            return Ok(());
        }
        slot.attrs.apply_if_dirty(pthread);
        if slot.attrs.affinity_dirty() {
            // dirty retained, retried on the next submission
            Err(SystemError::fail("affinity not applied"))
        } else {
            Ok(())
        }
    }

    fn unit_id(&self) -> u64 {
        self.id
    }

    fn policy(&self) -> i32 {
        self.inner.slot.lock().attrs.policy()
    }

    fn priority(&self) -> i32 {
        self.inner.slot.lock().attrs.priority()
    }

    fn result(&self) -> SysResult<T> {
        self.inner
            .result
            .lock()
            .clone()
            .unwrap_or_else(|| Err(SystemError::with(ResultCode::InvalidState, "no result")))
    }
}

impl<T: Clone + Send + 'static> Drop for ThreadTask<T> {
    fn drop(&mut self) {
        self.stop();
        let mut control = self.control.lock();
        let on_owned_thread = control
            .thread_id
            .map_or(false, |id| thread::current().id() == id);
        if let Some(handle) = control.handle.take() {
            if on_owned_thread {
                // self-join would deadlock; the handle detaches on drop
                drop(handle);
            } else {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskBuilder;
    use std::sync::mpsc;

    fn descriptor<T: Clone + Send + 'static>(
        name: &str,
        f: impl Fn() -> SysResult<T> + Send + Sync + 'static,
    ) -> TaskDescriptor<T> {
        TaskBuilder::new(name).func(f).build().unwrap()
    }

    #[test]
    fn executes_and_reports_result() {
        let unit = ThreadTask::<i32>::new();
        unit.init().unwrap();
        unit.execute(descriptor("answer", || Ok(42))).unwrap();
        unit.wait(Some(Duration::from_secs(2))).unwrap();
        assert_eq!(unit.result().unwrap(), 42);
        unit.stop();
    }

    #[test]
    fn empty_callable_is_invalid_argument() {
        let unit = ThreadTask::<()>::new();
        unit.init().unwrap();
        let err = unit.execute(TaskDescriptor::default()).unwrap_err();
        assert_eq!(err.code(), ResultCode::InvalidArgument);
        unit.stop();
    }

    #[test]
    fn pending_slot_refuses_second_descriptor() {
        let unit = ThreadTask::<()>::new();
        unit.init().unwrap();

        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = std::sync::Mutex::new(release_rx);
        unit.execute(descriptor("blocker", move || {
            release_rx.lock().unwrap().recv().ok();
            Ok(())
        }))
        .unwrap();

        // let the thread dequeue the blocker so the pending slot frees
        let deadline = Instant::now() + Duration::from_secs(2);
        while !unit.is_idle() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(unit.is_idle());

        // slot free again: one more pending descriptor is accepted...
        unit.execute(descriptor("pending", || Ok(()))).unwrap();
        // ...and a second pending one is refused
        let err = unit.execute(descriptor("refused", || Ok(()))).unwrap_err();
        assert_eq!(err.code(), ResultCode::ResourceBusy);

        release_tx.send(()).unwrap();
        unit.wait(Some(Duration::from_secs(2))).unwrap();
        unit.stop();
    }

    #[test]
    fn wait_times_out_on_long_task() {
        let unit = ThreadTask::<()>::new();
        unit.init().unwrap();
        unit.execute(descriptor("slow", || {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        }))
        .unwrap();
        let err = unit.wait(Some(Duration::from_millis(30))).unwrap_err();
        assert_eq!(err.code(), ResultCode::Timeout);
        unit.wait(Some(Duration::from_secs(2))).unwrap();
        unit.stop();
    }

    #[test]
    fn panicking_callable_becomes_fail_and_reaches_callback() {
        let unit = ThreadTask::<()>::new();
        unit.init().unwrap();
        let (tx, rx) = mpsc::channel();
        let desc = TaskBuilder::<()>::new("boom")
            .func(|| panic!("boom"))
            .on_complete(move |r| {
                tx.send(r.is_err()).unwrap();
            })
            .build()
            .unwrap();
        unit.execute(desc).unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(2)).unwrap());
        assert!(unit.result().is_err());
        unit.stop();
    }

    #[test]
    fn stop_is_idempotent_and_blocks_submissions() {
        let unit = ThreadTask::<()>::new();
        unit.init().unwrap();
        unit.stop();
        unit.stop();
        let err = unit.execute(descriptor("late", || Ok(()))).unwrap_err();
        assert_eq!(err.code(), ResultCode::InvalidState);
    }
}
