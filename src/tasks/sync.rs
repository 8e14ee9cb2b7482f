//! # Synchronous task unit.
//!
//! Executes the callable on the caller's context inside `execute` and
//! returns once the result is recorded. Affinity and scheduling are not
//! meaningful here and report `NotSupported`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::error;

use crate::error::{ResultCode, SysResult, SystemError};
use crate::tasks::descriptor::TaskDescriptor;
use crate::tasks::unit::{ExecutionMode, TaskUnit};

static UNIT_ID: AtomicU64 = AtomicU64::new(1);

/// Task unit that runs callables inline on the submitting thread.
pub struct SyncTask<T: Clone + Send + 'static = ()> {
    stop: AtomicBool,
    running: AtomicBool,
    result: Mutex<Option<SysResult<T>>>,
    id: u64,
}

impl<T: Clone + Send + 'static> Default for SyncTask<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> SyncTask<T> {
    pub fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            running: AtomicBool::new(false),
            result: Mutex::new(None),
            id: UNIT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl<T: Clone + Send + 'static> TaskUnit<T> for SyncTask<T> {
    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Sync
    }

    fn init(&self) -> SysResult<()> {
        self.stop.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn execute(&self, desc: TaskDescriptor<T>) -> SysResult<()> {
        if self.stop.load(Ordering::Relaxed) {
            return Err(SystemError::with(ResultCode::InvalidState, "unit stopped"));
        }
        let Some(func) = desc.func.clone() else {
            return Err(SystemError::with(
                ResultCode::InvalidArgument,
                "descriptor has no callable",
            ));
        };
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SystemError::with(
                ResultCode::ResourceBusy,
                "unit already executing",
            ));
        }

        let result = catch_unwind(AssertUnwindSafe(|| func())).unwrap_or_else(|_| {
            error!(task = %desc.name, "task callable panicked");
            Err(SystemError::fail("task callable panicked"))
        });
        *self.result.lock() = Some(result.clone());
        if let Some(cb) = &desc.on_complete {
            cb(&result);
        }
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn is_idle(&self) -> bool {
        !self.running.load(Ordering::Relaxed)
    }

    fn wait(&self, _timeout: Option<Duration>) -> SysResult<()> {
        // execution happens inside `execute`; nothing is ever in flight here
        Ok(())
    }

    fn join(&self) -> SysResult<()> {
        Ok(())
    }

    fn detach(&self) -> SysResult<()> {
        Ok(())
    }

    fn set_affinity(&self, _cores: &[usize]) -> SysResult<()> {
        Err(SystemError::with(
            ResultCode::NotSupported,
            "sync unit runs on the caller's thread",
        ))
    }

    fn unit_id(&self) -> u64 {
        self.id
    }

    fn result(&self) -> SysResult<T> {
        self.result
            .lock()
            .clone()
            .unwrap_or_else(|| Err(SystemError::with(ResultCode::InvalidState, "no result")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskBuilder;

    #[test]
    fn executes_inline() {
        let unit = SyncTask::<u32>::new();
        unit.init().unwrap();
        unit.execute(TaskBuilder::new("inline").func(|| Ok(7)).build().unwrap())
            .unwrap();
        assert_eq!(unit.result().unwrap(), 7);
    }

    #[test]
    fn affinity_is_not_supported() {
        let unit = SyncTask::<()>::new();
        let err = unit.set_affinity(&[0]).unwrap_err();
        assert_eq!(err.code(), ResultCode::NotSupported);
    }

    #[test]
    fn stop_prevents_execution() {
        let unit = SyncTask::<()>::new();
        unit.init().unwrap();
        unit.stop();
        let err = unit
            .execute(TaskBuilder::new("late").func(|| Ok(())).build().unwrap())
            .unwrap_err();
        assert_eq!(err.code(), ResultCode::InvalidState);
    }
}
