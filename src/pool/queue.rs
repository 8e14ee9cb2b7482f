//! # Pending task queue.
//!
//! Max-heap over `(priority, admission order)`: higher priority first, FIFO
//! on ties via a monotonic sequence number (timestamps can collide; the
//! sequence cannot). The queue also owns the per-task-name last-admitted
//! map that backs throttled dispatch.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::Instant;

use crate::error::{ResultCode, SysResult, SystemError};
use crate::tasks::{DispatchPolicy, TaskDescriptor};

/// One queued submission.
pub(crate) struct TaskItem {
    pub desc: TaskDescriptor<()>,
    pub priority: i32,
    pub enqueued: Instant,
    seq: u64,
}

impl PartialEq for TaskItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for TaskItem {}

impl PartialOrd for TaskItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TaskItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // higher priority first; earlier admission (lower seq) wins ties
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Bounded priority queue with throttle admission.
pub(crate) struct PendingQueue {
    heap: BinaryHeap<TaskItem>,
    last_admitted: HashMap<String, Instant>,
    next_seq: u64,
    max_queue: usize,
}

impl PendingQueue {
    pub(crate) fn new(max_queue: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            last_admitted: HashMap::new(),
            next_seq: 0,
            max_queue,
        }
    }

    /// Full admission path: capacity check, then throttle check, then push.
    pub(crate) fn admit(&mut self, desc: TaskDescriptor<()>, priority: i32) -> SysResult<()> {
        if self.heap.len() >= self.max_queue {
            return Err(SystemError::with(ResultCode::ResourceBusy, "task queue full"));
        }

        if desc.dispatch == DispatchPolicy::Throttled {
            let now = Instant::now();
            if let Some(last) = self.last_admitted.get(&desc.name) {
                if now.duration_since(*last) < desc.throttle {
                    return Err(SystemError::with(ResultCode::RateLimit, "task throttled"));
                }
            }
            self.last_admitted.insert(desc.name.clone(), now);
        }

        self.push(desc, priority);
        Ok(())
    }

    /// Capacity-only push, used by the dispatcher's boosted re-enqueue.
    pub(crate) fn try_push(&mut self, desc: TaskDescriptor<()>, priority: i32) -> bool {
        if self.heap.len() >= self.max_queue {
            return false;
        }
        self.push(desc, priority);
        true
    }

    fn push(&mut self, desc: TaskDescriptor<()>, priority: i32) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(TaskItem {
            desc,
            priority,
            enqueued: Instant::now(),
            seq,
        });
    }

    pub(crate) fn pop(&mut self) -> Option<TaskItem> {
        self.heap.pop()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn clear(&mut self) {
        self.heap.clear();
        self.last_admitted.clear();
    }
}
