//! # Work descriptors.
//!
//! A [`TaskDescriptor`] is a value object describing one unit of work: a
//! named callable plus how it should be dispatched and where it should run.
//! [`TaskBuilder`] is the construction path and enforces the descriptor
//! invariants at `build()`:
//!
//! - the callable is present,
//! - a throttle window is set iff the dispatch policy is `Throttled`.

use std::time::Duration;

use crate::error::{ResultCode, SysResult, SystemError};
use crate::tasks::unit::{CompleteFn, TaskFn};

/// How a pool admits the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
    /// Admit unconditionally (subject to queue capacity).
    #[default]
    Immediate,
    /// Admit at most once per throttle window per task name.
    Throttled,
    /// Admit but let the dispatcher defer execution.
    Deferred,
}

/// Value object describing work to run on a task unit.
#[derive(Clone)]
pub struct TaskDescriptor<T = ()> {
    /// Task name; used for log tags and as the throttling key.
    pub name: String,
    /// The callable. Empty descriptors are refused at `execute`.
    pub func: Option<TaskFn<T>>,
    /// Completion callback, invoked with the result of every execution.
    pub on_complete: Option<CompleteFn<T>>,
    /// Pool admission policy.
    pub dispatch: DispatchPolicy,
    /// Throttle window; meaningful only with `DispatchPolicy::Throttled`.
    pub throttle: Duration,
    /// CPU cores the task prefers (thread variant only).
    pub affinity: Vec<usize>,
    /// OS scheduling policy (0 = leave unchanged).
    pub policy: i32,
    /// OS scheduling priority (0 = leave unchanged).
    pub priority: i32,
}

impl<T> Default for TaskDescriptor<T> {
    fn default() -> Self {
        Self {
            name: String::new(),
            func: None,
            on_complete: None,
            dispatch: DispatchPolicy::Immediate,
            throttle: Duration::ZERO,
            affinity: Vec::new(),
            policy: 0,
            priority: 0,
        }
    }
}

impl<T> std::fmt::Debug for TaskDescriptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDescriptor")
            .field("name", &self.name)
            .field("func", &self.func.is_some())
            .field("dispatch", &self.dispatch)
            .field("throttle", &self.throttle)
            .field("affinity", &self.affinity)
            .field("policy", &self.policy)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Fluent constructor for [`TaskDescriptor`].
pub struct TaskBuilder<T = ()> {
    desc: TaskDescriptor<T>,
}

impl<T> Default for TaskBuilder<T> {
    fn default() -> Self {
        Self {
            desc: TaskDescriptor::default(),
        }
    }
}

impl<T> TaskBuilder<T> {
    pub fn new(name: impl Into<String>) -> Self {
        let mut b = Self::default();
        b.desc.name = name.into();
        b
    }

    pub fn func(mut self, f: impl Fn() -> SysResult<T> + Send + Sync + 'static) -> Self {
        self.desc.func = Some(std::sync::Arc::new(f));
        self
    }

    pub fn on_complete(mut self, cb: impl Fn(&SysResult<T>) + Send + Sync + 'static) -> Self {
        self.desc.on_complete = Some(std::sync::Arc::new(cb));
        self
    }

    pub fn dispatch(mut self, policy: DispatchPolicy) -> Self {
        self.desc.dispatch = policy;
        self
    }

    pub fn throttle(mut self, window: Duration) -> Self {
        self.desc.throttle = window;
        self
    }

    pub fn affinity(mut self, cores: impl Into<Vec<usize>>) -> Self {
        self.desc.affinity = cores.into();
        self
    }

    pub fn policy(mut self, policy: i32) -> Self {
        self.desc.policy = policy;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.desc.priority = priority;
        self
    }

    /// Validates the descriptor invariants and returns the descriptor.
    pub fn build(self) -> SysResult<TaskDescriptor<T>> {
        if self.desc.func.is_none() {
            return Err(SystemError::with(
                ResultCode::InvalidArgument,
                "task descriptor requires a callable",
            ));
        }
        let throttled = self.desc.dispatch == DispatchPolicy::Throttled;
        if throttled && self.desc.throttle.is_zero() {
            return Err(SystemError::with(
                ResultCode::InvalidArgument,
                "throttled dispatch requires a throttle window",
            ));
        }
        if !throttled && !self.desc.throttle.is_zero() {
            return Err(SystemError::with(
                ResultCode::InvalidArgument,
                "throttle window is only valid with throttled dispatch",
            ));
        }
        Ok(self.desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_callable() {
        let err = TaskBuilder::<()>::new("empty").build().unwrap_err();
        assert_eq!(err.code(), ResultCode::InvalidArgument);
    }

    #[test]
    fn throttle_window_required_iff_throttled() {
        let err = TaskBuilder::<()>::new("t")
            .func(|| Ok(()))
            .dispatch(DispatchPolicy::Throttled)
            .build()
            .unwrap_err();
        assert_eq!(err.code(), ResultCode::InvalidArgument);

        let err = TaskBuilder::<()>::new("t")
            .func(|| Ok(()))
            .throttle(Duration::from_millis(100))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), ResultCode::InvalidArgument);

        let desc = TaskBuilder::<()>::new("t")
            .func(|| Ok(()))
            .dispatch(DispatchPolicy::Throttled)
            .throttle(Duration::from_millis(100))
            .build()
            .unwrap();
        assert_eq!(desc.dispatch, DispatchPolicy::Throttled);
    }

    #[test]
    fn builder_carries_placement() {
        let desc = TaskBuilder::<i32>::new("calc")
            .func(|| Ok(41))
            .affinity([0usize, 2])
            .policy(1)
            .priority(10)
            .build()
            .unwrap();
        assert_eq!(desc.affinity, vec![0, 2]);
        assert_eq!(desc.policy, 1);
        assert_eq!(desc.priority, 10);
    }
}
