//! # Worker: lifecycle wrapper over a thread task.
//!
//! A [`Worker`] drives one [`ThreadTask`] through a cooperative lifecycle
//! and runs a [`Work`] implementation in one of three modes:
//!
//! - **Single**: run once.
//! - **Loop**: run repeatedly, sleeping `loop_sleep` between iterations;
//!   honors `pause`/`resume`.
//! - **Event**: run once per [`Worker::event`] signal, no sleep between.
//!
//! ```text
//! Init → Ready       on init(desc, work)
//! Ready → Running    on start()
//! Running → Stopping on stop() or on run() returning failure
//! Stopping → Stopped after the owned thread joins
//! ```
//!
//! ## Rules
//! - `pause`/`resume` return `NotSupported` outside Loop mode.
//! - `event` is a no-op outside Event mode.
//! - `stop` is idempotent; `stop_requested` is monotonic until `Stopped`.
//! - A panicking `run` is logged and treated as failure (worker stops).
//! - `Ready → Running` again only after a full `Stopped` and re-`init`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

use crate::error::{ResultCode, SysResult, SystemError};
use crate::tasks::{TaskBuilder, TaskUnit, ThreadTask};

/// Lifecycle states of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Init,
    Ready,
    Running,
    Stopping,
    Stopped,
}

/// Execution mode of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerType {
    #[default]
    Single,
    Loop,
    Event,
}

/// Construction parameters of a worker.
#[derive(Debug, Clone)]
pub struct WorkerDescriptor {
    /// Worker name; becomes the owned thread's name.
    pub name: String,
    /// CPU cores for the owned thread.
    pub affinity: Vec<usize>,
    /// OS scheduling policy (0 = leave unchanged).
    pub policy: i32,
    /// OS scheduling priority (0 = leave unchanged).
    pub priority: i32,
    /// Execution mode.
    pub kind: WorkerType,
    /// Sleep between Loop-mode iterations.
    pub loop_sleep: Duration,
}

impl Default for WorkerDescriptor {
    fn default() -> Self {
        Self {
            name: String::new(),
            affinity: Vec::new(),
            policy: 0,
            priority: 0,
            kind: WorkerType::Single,
            loop_sleep: Duration::from_secs(1),
        }
    }
}

/// Snapshot of a worker's observable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStatus {
    pub state: WorkerState,
    pub kind: WorkerType,
    pub paused: bool,
    pub sleeping: bool,
    pub stop_requested: bool,
}

/// The work a worker executes, plus its lifecycle hooks.
///
/// Hooks default to no-ops; pools override them to build and tear down
/// their unit fleets around the dispatch loop.
pub trait Work: Send + Sync + 'static {
    /// One execution. Loop mode calls it repeatedly, Event mode once per
    /// signal, Single mode once.
    fn run(&self, cx: &WorkerContext) -> SysResult<()>;

    /// Called after every `run` with its result.
    fn on_completed(&self, _result: &SysResult<()>) {}

    /// Called before the owned thread receives the entry; failure aborts `start`.
    fn on_pre_start(&self) -> SysResult<()> {
        Ok(())
    }

    fn on_post_start(&self) {}

    fn on_pre_stop(&self) {}

    fn on_post_stop(&self) {}
}

/// Handle given to [`Work::run`] for cooperative checks.
#[derive(Clone)]
pub struct WorkerContext {
    shared: Arc<Shared>,
}

impl WorkerContext {
    /// Whether a stop has been requested; long-running work must poll this.
    pub fn stop_requested(&self) -> bool {
        self.shared.flags.lock().stop_requested
    }
}

struct Shared {
    flags: Mutex<Flags>,
    cond: Condvar,
    event_cond: Condvar,
}

struct Flags {
    state: WorkerState,
    kind: WorkerType,
    paused: bool,
    sleeping: bool,
    stop_requested: bool,
    event: bool,
}

/// Lifecycle wrapper over one [`ThreadTask`].
pub struct Worker {
    shared: Arc<Shared>,
    thread: ThreadTask<()>,
    desc: Mutex<WorkerDescriptor>,
    work: Mutex<Option<Arc<dyn Work>>>,
}

impl Default for Worker {
    fn default() -> Self {
        Self::new()
    }
}

impl Worker {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                flags: Mutex::new(Flags {
                    state: WorkerState::Init,
                    kind: WorkerType::Single,
                    paused: false,
                    sleeping: false,
                    stop_requested: false,
                    event: false,
                }),
                cond: Condvar::new(),
                event_cond: Condvar::new(),
            }),
            thread: ThreadTask::new(),
            desc: Mutex::new(WorkerDescriptor::default()),
            work: Mutex::new(None),
        }
    }

    /// Binds the descriptor and work, spawns the owned thread, moves to Ready.
    pub fn init(&self, desc: WorkerDescriptor, work: Arc<dyn Work>) -> SysResult<()> {
        debug!(worker = %desc.name, "init");
        {
            let mut flags = self.shared.flags.lock();
            if flags.state != WorkerState::Init && flags.state != WorkerState::Stopped {
                return Err(SystemError::with(
                    ResultCode::AlreadyExists,
                    "worker already initialized",
                ));
            }
            flags.kind = desc.kind;
            flags.state = WorkerState::Ready;
            flags.paused = false;
            flags.sleeping = false;
            flags.stop_requested = false;
            flags.event = false;
        }
        *self.desc.lock() = desc;
        *self.work.lock() = Some(work);

        if let Err(e) = self.thread.init() {
            self.thread.stop();
            return Err(e);
        }
        Ok(())
    }

    /// Hands the mode entry to the owned thread and moves to Running.
    pub fn start(&self) -> SysResult<()> {
        let desc = self.desc.lock().clone();
        debug!(worker = %desc.name, "start");
        {
            let flags = self.shared.flags.lock();
            if flags.state == WorkerState::Running {
                return Err(SystemError::with(
                    ResultCode::InvalidState,
                    "worker already running",
                ));
            }
            if flags.state != WorkerState::Ready {
                return Err(SystemError::with(
                    ResultCode::InvalidState,
                    "worker not initialized",
                ));
            }
        }
        let work = self
            .work
            .lock()
            .clone()
            .ok_or_else(|| SystemError::with(ResultCode::InvalidState, "no work bound"))?;

        work.on_pre_start()?;

        let shared = Arc::clone(&self.shared);
        let kind = desc.kind;
        let loop_sleep = desc.loop_sleep;
        let entry_work = Arc::clone(&work);
        let name = desc.name.clone();
        let td = TaskBuilder::<()>::new(desc.name.clone())
            .affinity(desc.affinity.clone())
            .policy(desc.policy)
            .priority(desc.priority)
            .func(move || match kind {
                WorkerType::Single => single_entry(&shared, &entry_work, &name),
                WorkerType::Loop => loop_entry(&shared, &entry_work, &name, loop_sleep),
                WorkerType::Event => event_entry(&shared, &entry_work, &name),
            })
            .build()?;

        self.thread.execute(td)?;
        {
            let mut flags = self.shared.flags.lock();
            flags.state = WorkerState::Running;
            self.shared.cond.notify_all();
        }
        work.on_post_start();
        Ok(())
    }

    /// Requests a stop and joins the owned thread. Idempotent.
    pub fn stop(&self) -> SysResult<()> {
        {
            let mut flags = self.shared.flags.lock();
            if flags.state != WorkerState::Running && flags.state != WorkerState::Stopping {
                return Ok(());
            }
            flags.state = WorkerState::Stopping;
            flags.stop_requested = true;
            flags.paused = false;
            flags.sleeping = false;
            self.shared.cond.notify_all();
            self.shared.event_cond.notify_all();
        }

        let work = self.work.lock().clone();
        if let Some(work) = &work {
            work.on_pre_stop();
        }

        self.thread.stop();
        if let Err(e) = self.thread.join() {
            error!(error = %e, "worker thread join failed");
        }

        {
            let mut flags = self.shared.flags.lock();
            flags.state = WorkerState::Stopped;
            flags.paused = false;
            flags.sleeping = false;
            flags.stop_requested = false;
            flags.event = false;
        }
        if let Some(work) = &work {
            work.on_post_stop();
        }
        Ok(())
    }

    /// Suspends Loop-mode iteration.
    pub fn pause(&self) -> SysResult<()> {
        let mut flags = self.shared.flags.lock();
        if flags.kind != WorkerType::Loop {
            return Err(SystemError::with(
                ResultCode::NotSupported,
                "pause() only available in Loop mode",
            ));
        }
        flags.paused = true;
        Ok(())
    }

    /// Resumes Loop-mode iteration.
    pub fn resume(&self) -> SysResult<()> {
        let mut flags = self.shared.flags.lock();
        if flags.kind != WorkerType::Loop {
            return Err(SystemError::with(
                ResultCode::NotSupported,
                "resume() only available in Loop mode",
            ));
        }
        flags.paused = false;
        self.shared.cond.notify_all();
        Ok(())
    }

    /// Signals Event-mode work. No-op in other modes.
    pub fn event(&self) {
        let mut flags = self.shared.flags.lock();
        if flags.kind != WorkerType::Event {
            return;
        }
        flags.event = true;
        self.shared.event_cond.notify_all();
    }

    /// Interruptible sleep; cut short by [`Worker::wakeup`] or stop.
    pub fn sleep(&self, duration: Duration) {
        sleep_interruptible(&self.shared, duration);
    }

    /// Cuts a [`Worker::sleep`] short.
    pub fn wakeup(&self) {
        let mut flags = self.shared.flags.lock();
        flags.sleeping = false;
        self.shared.cond.notify_all();
    }

    pub fn is_initialized(&self) -> bool {
        let state = self.shared.flags.lock().state;
        state == WorkerState::Ready || state == WorkerState::Running
    }

    pub fn is_stop_requested(&self) -> bool {
        self.shared.flags.lock().stop_requested
    }

    pub fn status(&self) -> WorkerStatus {
        let flags = self.shared.flags.lock();
        WorkerStatus {
            state: flags.state,
            kind: flags.kind,
            paused: flags.paused,
            sleeping: flags.sleeping,
            stop_requested: flags.stop_requested,
        }
    }

    /// Context handle for code outside `run` that shares the cooperative flags.
    pub fn context(&self) -> WorkerContext {
        WorkerContext {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn wait_for_start(shared: &Shared) -> bool {
    let mut flags = shared.flags.lock();
    loop {
        if flags.stop_requested {
            return false;
        }
        if flags.state == WorkerState::Running {
            return true;
        }
        shared.cond.wait(&mut flags);
    }
}

fn run_caught(work: &Arc<dyn Work>, cx: &WorkerContext, name: &str) -> SysResult<()> {
    catch_unwind(AssertUnwindSafe(|| work.run(cx))).unwrap_or_else(|_| {
        error!(worker = name, "run() panicked");
        Err(SystemError::fail("worker run panicked"))
    })
}

/// Marks failure: Running → Stopping with `stop_requested` latched.
fn mark_failed(shared: &Shared) {
    let mut flags = shared.flags.lock();
    flags.state = WorkerState::Stopping;
    flags.stop_requested = true;
    shared.cond.notify_all();
    shared.event_cond.notify_all();
}

fn finish(shared: &Shared) {
    let mut flags = shared.flags.lock();
    flags.state = WorkerState::Stopped;
}

fn sleep_interruptible(shared: &Shared, duration: Duration) {
    let deadline = Instant::now() + duration;
    let mut flags = shared.flags.lock();
    flags.sleeping = true;
    while flags.sleeping && !flags.stop_requested {
        if shared.cond.wait_until(&mut flags, deadline).timed_out() {
            break;
        }
    }
    flags.sleeping = false;
}

fn single_entry(shared: &Arc<Shared>, work: &Arc<dyn Work>, name: &str) -> SysResult<()> {
    if !wait_for_start(shared) {
        return Ok(());
    }
    let cx = WorkerContext {
        shared: Arc::clone(shared),
    };
    let result = run_caught(work, &cx, name);
    work.on_completed(&result);
    finish(shared);
    result
}

fn loop_entry(
    shared: &Arc<Shared>,
    work: &Arc<dyn Work>,
    name: &str,
    loop_sleep: Duration,
) -> SysResult<()> {
    debug!(worker = name, "loop start");
    if !wait_for_start(shared) {
        return Ok(());
    }
    let cx = WorkerContext {
        shared: Arc::clone(shared),
    };
    let mut result = Ok(());
    loop {
        {
            let mut flags = shared.flags.lock();
            while flags.paused && !flags.stop_requested {
                shared.cond.wait(&mut flags);
            }
            if flags.stop_requested || flags.state != WorkerState::Running {
                break;
            }
        }
        result = run_caught(work, &cx, name);
        work.on_completed(&result);
        if result.is_err() {
            mark_failed(shared);
            break;
        }
        if shared.flags.lock().stop_requested {
            break;
        }
        sleep_interruptible(shared, loop_sleep);
    }
    finish(shared);
    result
}

fn event_entry(shared: &Arc<Shared>, work: &Arc<dyn Work>, name: &str) -> SysResult<()> {
    debug!(worker = name, "event loop start");
    if !wait_for_start(shared) {
        return Ok(());
    }
    let cx = WorkerContext {
        shared: Arc::clone(shared),
    };
    let mut result = Ok(());
    loop {
        {
            let mut flags = shared.flags.lock();
            while !flags.event && !flags.stop_requested {
                shared.event_cond.wait(&mut flags);
            }
            if flags.stop_requested || flags.state != WorkerState::Running {
                break;
            }
            flags.event = false;
        }
        result = run_caught(work, &cx, name);
        work.on_completed(&result);
        if result.is_err() {
            mark_failed(shared);
            break;
        }
        if shared.flags.lock().stop_requested {
            break;
        }
    }
    finish(shared);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    struct CountWork {
        runs: AtomicUsize,
        fail_after: Option<usize>,
        done: parking_lot::Mutex<Option<mpsc::Sender<()>>>,
    }

    impl CountWork {
        fn new(fail_after: Option<usize>) -> (Arc<Self>, mpsc::Receiver<()>) {
            let (tx, rx) = mpsc::channel();
            (
                Arc::new(Self {
                    runs: AtomicUsize::new(0),
                    fail_after,
                    done: parking_lot::Mutex::new(Some(tx)),
                }),
                rx,
            )
        }
    }

    impl Work for CountWork {
        fn run(&self, _cx: &WorkerContext) -> SysResult<()> {
            let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(tx) = self.done.lock().as_ref() {
                let _ = tx.send(());
            }
            match self.fail_after {
                Some(limit) if n >= limit => Err(SystemError::fail("limit reached")),
                _ => Ok(()),
            }
        }
    }

    fn descriptor(kind: WorkerType) -> WorkerDescriptor {
        WorkerDescriptor {
            name: "test-worker".into(),
            kind,
            loop_sleep: Duration::from_millis(5),
            ..WorkerDescriptor::default()
        }
    }

    fn wait_stopped(worker: &Worker) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while worker.status().state != WorkerState::Stopped && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn single_mode_runs_once() {
        let (work, rx) = CountWork::new(None);
        let worker = Worker::new();
        worker.init(descriptor(WorkerType::Single), work.clone()).unwrap();
        worker.start().unwrap();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        wait_stopped(&worker);
        assert_eq!(work.runs.load(Ordering::SeqCst), 1);
        worker.stop().unwrap();
    }

    #[test]
    fn loop_mode_repeats_and_pauses() {
        let (work, rx) = CountWork::new(None);
        let worker = Worker::new();
        worker.init(descriptor(WorkerType::Loop), work.clone()).unwrap();
        worker.start().unwrap();

        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();

        worker.pause().unwrap();
        // drain anything emitted before the pause took effect
        while rx.recv_timeout(Duration::from_millis(100)).is_ok() {}
        let paused_count = work.runs.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(work.runs.load(Ordering::SeqCst), paused_count);

        worker.resume().unwrap();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        worker.stop().unwrap();
        assert_eq!(worker.status().state, WorkerState::Stopped);
    }

    #[test]
    fn event_mode_runs_once_per_signal() {
        let (work, rx) = CountWork::new(None);
        let worker = Worker::new();
        worker.init(descriptor(WorkerType::Event), work.clone()).unwrap();
        worker.start().unwrap();

        worker.event();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(work.runs.load(Ordering::SeqCst), 1);

        worker.event();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(work.runs.load(Ordering::SeqCst), 2);

        worker.stop().unwrap();
    }

    #[test]
    fn failing_run_stops_the_worker() {
        let (work, rx) = CountWork::new(Some(1));
        let worker = Worker::new();
        worker.init(descriptor(WorkerType::Loop), work).unwrap();
        worker.start().unwrap();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        wait_stopped(&worker);
        let status = worker.status();
        assert_eq!(status.state, WorkerState::Stopped);
    }

    #[test]
    fn pause_outside_loop_is_not_supported() {
        let (work, _rx) = CountWork::new(None);
        let worker = Worker::new();
        worker.init(descriptor(WorkerType::Event), work).unwrap();
        let err = worker.pause().unwrap_err();
        assert_eq!(err.code(), ResultCode::NotSupported);
        let err = worker.resume().unwrap_err();
        assert_eq!(err.code(), ResultCode::NotSupported);
    }

    #[test]
    fn stop_is_idempotent() {
        let (work, rx) = CountWork::new(None);
        let worker = Worker::new();
        worker.init(descriptor(WorkerType::Loop), work).unwrap();
        worker.start().unwrap();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        worker.stop().unwrap();
        worker.stop().unwrap();
        assert_eq!(worker.status().state, WorkerState::Stopped);
    }

    #[test]
    fn restart_requires_full_stop_and_reinit() {
        let (work, rx) = CountWork::new(None);
        let worker = Worker::new();
        worker.init(descriptor(WorkerType::Event), work.clone()).unwrap();
        worker.start().unwrap();
        let err = worker.start().unwrap_err();
        assert_eq!(err.code(), ResultCode::InvalidState);

        worker.stop().unwrap();
        worker.init(descriptor(WorkerType::Event), work).unwrap();
        worker.start().unwrap();
        worker.event();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        worker.stop().unwrap();
    }
}
