//! # Thread pool.
//!
//! Event-mode worker dispatching over a fleet of [`ThreadTask`] units.
//! Units are created in `on_pre_start` and optionally pinned round-robin to
//! `core_affinity`; a `core → unit ids` index backs affinity-matched
//! candidate selection. Descriptors with an affinity set dispatch to units
//! pinned on any requested core, falling back to the whole fleet when the
//! filtered set is empty.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{ResultCode, SysResult};
use crate::events::{Bus, Event, EventKind};
use crate::pool::dispatch::run_dispatch;
use crate::pool::queue::PendingQueue;
use crate::pool::stats::{PoolStats, PoolStatsSnapshot};
use crate::tasks::{TaskDescriptor, TaskUnit, ThreadTask};
use crate::worker::{Work, Worker, WorkerContext, WorkerDescriptor, WorkerType};

/// Construction parameters for a [`ThreadPool`].
#[derive(Debug, Clone)]
pub struct ThreadPoolDescriptor {
    /// Total units to create; 0 falls back to the core count.
    pub thread_count: usize,
    /// Cores to pin units to, round-robin. Empty = no pinning.
    pub core_affinity: Vec<usize>,
    /// Pending-queue capacity.
    pub max_queue: usize,
}

impl Default for ThreadPoolDescriptor {
    fn default() -> Self {
        Self {
            thread_count: available_cores(),
            core_affinity: Vec::new(),
            max_queue: 128,
        }
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

struct Fleet {
    units: Vec<Arc<ThreadTask<()>>>,
    by_id: HashMap<u64, Arc<ThreadTask<()>>>,
    core_index: HashMap<usize, BTreeSet<u64>>,
}

impl Fleet {
    fn empty() -> Self {
        Self {
            units: Vec::new(),
            by_id: HashMap::new(),
            core_index: HashMap::new(),
        }
    }
}

struct ThreadPoolCore {
    desc: ThreadPoolDescriptor,
    queue: Mutex<PendingQueue>,
    fleet: Mutex<Fleet>,
    stats: PoolStats,
    bus: Option<Bus>,
}

impl ThreadPoolCore {
    /// Units pinned to any requested core; the whole fleet when the request
    /// is empty or matches nothing.
    fn candidates(&self, desc: &TaskDescriptor<()>) -> Vec<Arc<dyn TaskUnit<()>>> {
        let fleet = self.fleet.lock();
        if !desc.affinity.is_empty() {
            let mut ids = BTreeSet::new();
            for core in &desc.affinity {
                if let Some(bound) = fleet.core_index.get(core) {
                    ids.extend(bound.iter().copied());
                }
            }
            if !ids.is_empty() {
                return ids
                    .iter()
                    .filter_map(|id| fleet.by_id.get(id))
                    .map(|u| Arc::clone(u) as Arc<dyn TaskUnit<()>>)
                    .collect();
            }
        }
        fleet
            .units
            .iter()
            .map(|u| Arc::clone(u) as Arc<dyn TaskUnit<()>>)
            .collect()
    }
}

impl Work for ThreadPoolCore {
    fn run(&self, cx: &WorkerContext) -> SysResult<()> {
        run_dispatch(
            cx,
            "thread-pool",
            &self.queue,
            &self.stats,
            self.bus.as_ref(),
            &|desc| self.candidates(desc),
        )
    }

    fn on_pre_start(&self) -> SysResult<()> {
        let mut fleet = self.fleet.lock();
        *fleet = Fleet::empty();

        let core_count = if self.desc.core_affinity.is_empty() {
            available_cores()
        } else {
            self.desc.core_affinity.len()
        };
        let total = if self.desc.thread_count != 0 {
            self.desc.thread_count
        } else {
            core_count
        };

        info!(
            total,
            core_count,
            pinned = !self.desc.core_affinity.is_empty(),
            "thread pool starting units"
        );

        for i in 0..total {
            let unit = Arc::new(ThreadTask::<()>::new());
            if let Err(e) = unit.init() {
                *fleet = Fleet::empty();
                return Err(e);
            }

            if !self.desc.core_affinity.is_empty() {
                let core = self.desc.core_affinity[i % self.desc.core_affinity.len()];
                match unit.set_affinity(&[core]) {
                    Ok(()) => {
                        fleet.core_index.entry(core).or_default().insert(unit.unit_id());
                    }
                    Err(e) => {
                        warn!(core, unit = unit.unit_id(), error = %e, "core pinning failed");
                    }
                }
            }

            fleet.by_id.insert(unit.unit_id(), Arc::clone(&unit));
            fleet.units.push(unit);
        }
        Ok(())
    }

    fn on_post_stop(&self) {
        let mut fleet = self.fleet.lock();
        for unit in &fleet.units {
            unit.stop();
        }
        *fleet = Fleet::empty();
        self.queue.lock().clear();
    }
}

/// Priority-queue dispatcher over a fleet of thread-backed units.
pub struct ThreadPool {
    core: Arc<ThreadPoolCore>,
    worker: Worker,
}

impl ThreadPool {
    pub fn new(desc: ThreadPoolDescriptor) -> SysResult<Self> {
        Self::build(desc, None)
    }

    /// Pool that publishes drop events on the platform bus.
    pub fn with_bus(desc: ThreadPoolDescriptor, bus: Bus) -> SysResult<Self> {
        Self::build(desc, Some(bus))
    }

    fn build(desc: ThreadPoolDescriptor, bus: Option<Bus>) -> SysResult<Self> {
        let max_queue = desc.max_queue;
        let core = Arc::new(ThreadPoolCore {
            desc,
            queue: Mutex::new(PendingQueue::new(max_queue)),
            fleet: Mutex::new(Fleet::empty()),
            stats: PoolStats::default(),
            bus,
        });
        let worker = Worker::new();
        worker.init(
            WorkerDescriptor {
                name: "thread-pool".into(),
                kind: WorkerType::Event,
                ..WorkerDescriptor::default()
            },
            Arc::clone(&core) as Arc<dyn Work>,
        )?;
        Ok(Self { core, worker })
    }

    /// Starts the dispatch worker (and, through it, the unit fleet).
    pub fn start(&self) -> SysResult<()> {
        self.worker.start()
    }

    /// Stops dispatching and tears the fleet down. Idempotent.
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

    /// Pending submissions not yet handed to a unit.
    pub fn queued(&self) -> usize {
        self.core.queue.lock().len()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        let _ = self.worker.stop();
    }
}
