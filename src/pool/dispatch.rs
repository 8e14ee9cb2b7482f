//! # Shared dispatch loop.
//!
//! Both pool variants run this loop inside their Event-mode worker: pop the
//! highest-priority item, scan candidate units for an idle one, execute, and
//! re-enqueue with a priority boost when the whole fleet is busy. The boost
//! keeps a starved task ahead of fresh arrivals at its original priority;
//! the bounded retry keeps a full queue from churning forever.

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::error::SysResult;
use crate::events::{Bus, Event, EventKind};
use crate::pool::queue::PendingQueue;
use crate::pool::stats::PoolStats;
use crate::pool::{LOOP_SLEEP, MAX_RETRY, RETRY_PRIORITY_BOOST};
use crate::tasks::{TaskDescriptor, TaskUnit};
use crate::worker::WorkerContext;

pub(crate) type CandidateFn<'a> = dyn Fn(&TaskDescriptor<()>) -> Vec<Arc<dyn TaskUnit<()>>> + Send + Sync + 'a;

pub(crate) fn run_dispatch(
    cx: &WorkerContext,
    pool_name: &str,
    queue: &Mutex<PendingQueue>,
    stats: &PoolStats,
    bus: Option<&Bus>,
    candidates_for: &CandidateFn<'_>,
) -> SysResult<()> {
    while !cx.stop_requested() {
        let Some(item) = queue.lock().pop() else {
            break;
        };

        let mut assigned = false;
        for unit in candidates_for(&item.desc) {
            if !unit.is_idle() {
                continue;
            }
            match unit.execute(item.desc.clone()) {
                Ok(()) => {
                    stats.record_executed();
                    assigned = true;
                    break;
                }
                Err(e) => {
                    debug!(pool = pool_name, task = %item.desc.name, unit = unit.unit_id(),
                           error = %e, "unit refused task");
                    stats.record_failed();
                }
            }
        }

        if !assigned {
            let mut pushed = false;
            for retry in 1..=MAX_RETRY {
                let boosted = item.priority + RETRY_PRIORITY_BOOST * retry as i32;
                if queue.lock().try_push(item.desc.clone(), boosted) {
                    warn!(pool = pool_name, task = %item.desc.name, retry, boosted,
                          "requeued task with boosted priority");
                    pushed = true;
                    break;
                }
                thread::sleep(LOOP_SLEEP);
            }
            if !pushed {
                stats.record_dropped();
                error!(pool = pool_name, task = %item.desc.name,
                       age_ms = item.enqueued.elapsed().as_millis() as u64,
                       "dropped task after requeue retries");
                if let Some(bus) = bus {
                    bus.publish(Event::now(EventKind::PoolTaskDropped).with_name(&item.desc.name));
                }
            }
        }

        let has_more = !queue.lock().is_empty();
        if has_more {
            thread::sleep(LOOP_SLEEP);
        }
    }
    Ok(())
}
