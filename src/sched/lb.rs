//! Load-balancer coordination
//!
//! The balancing agent runs out of band. It reads statistics, per-domain
//! load and per-task reports, and answers with rebalance directives
//! (`pid -> domain`). Ownership is split: the agent writes directives and
//! reads everything else through `LbAgent`, the engine only reads
//! directives. Directives are advisory; the enqueue path revalidates them
//! against the task's current affinity.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::RwLock;

use crate::error::SchedError;

use super::core::DomainScheduler;
use super::host::SchedHost;
use super::stats::StatsSnapshot;
use super::types::{DomId, Pid};

// ============================================================================
// Directive Table
// ============================================================================

pub struct LbTable {
    directives: RwLock<BTreeMap<Pid, DomId>>,
    /// Bumped on every agent write.
    generation: AtomicU64,
    capacity: usize,
}

impl LbTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            directives: RwLock::new(BTreeMap::new()),
            generation: AtomicU64::new(0),
            capacity,
        }
    }

    /// Add a directive unless one is already pending for `pid`.
    pub fn request(&self, pid: Pid, dom: DomId) -> Result<(), SchedError> {
        let mut directives = self.directives.write();
        if directives.contains_key(&pid) {
            return Err(SchedError::DirectiveExists(pid));
        }
        if directives.len() >= self.capacity {
            return Err(SchedError::TableFull);
        }
        directives.insert(pid, dom);
        self.generation.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Drop every pending directive, typically at the start of a round.
    pub fn clear(&self) {
        self.directives.write().clear();
        self.generation.fetch_add(1, Ordering::Release);
    }

    pub fn lookup(&self, pid: Pid) -> Option<DomId> {
        self.directives.read().get(&pid).copied()
    }

    pub fn len(&self) -> usize {
        self.directives.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.read().is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

// ============================================================================
// Agent Reports
// ============================================================================

/// Per-task signals the agent balances on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskStat {
    pub pid: Pid,
    pub dom_id: DomId,
    pub dom_mask: u64,
    pub weight: u32,
    pub runnable_for: u64,
    /// Decayed average weight while runnable.
    pub load: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DomStat {
    pub id: DomId,
    pub nr_cpus: u32,
    pub nr_queued: usize,
    pub vtime_now: u64,
    /// Decayed average of the summed runnable weight.
    pub load: u64,
}

/// The agent's view of an engine.
pub struct LbAgent<'a, H: SchedHost> {
    sched: &'a DomainScheduler<H>,
}

impl<'a, H: SchedHost> LbAgent<'a, H> {
    pub(super) fn new(sched: &'a DomainScheduler<H>) -> Self {
        Self { sched }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.sched.stats()
    }

    pub fn dom_stats(&self, now: u64) -> Vec<DomStat> {
        (0..self.sched.topology().nr_doms() as DomId)
            .filter_map(|dom| self.sched.dom_stat(dom, now))
            .collect()
    }

    pub fn task_stats(&self, now: u64) -> Vec<TaskStat> {
        self.sched.task_stats(now)
    }

    /// Ask for `pid` to move to `dom` on its next enqueue.
    pub fn request_migration(&self, pid: Pid, dom: DomId) -> Result<(), SchedError> {
        if dom as usize >= self.sched.topology().nr_doms() {
            return Err(SchedError::DomainNotFound(dom));
        }
        self.sched.lb().request(pid, dom)?;
        crate::kdebug!("lb: pid {} -> dom {}", pid, dom);
        Ok(())
    }

    pub fn clear_directives(&self) {
        self.sched.lb().clear();
    }

    pub fn pending(&self) -> usize {
        self.sched.lb().len()
    }

    pub fn generation(&self) -> u64 {
        self.sched.lb().generation()
    }
}
