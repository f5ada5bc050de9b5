//! Scheduling domains
//!
//! A domain is a fixed set of CPUs sharing one dispatch queue and one
//! virtual-time clock. It also carries the aggregate load of its runnable
//! tasks as a decayed running average for the balancing agent.
//!
//! ## Lock Hierarchy
//!
//! 1. Task context (`TaskTable` slot)
//! 2. Domain queue or domain load, never both at once
//!
//! The dispatch path takes a queue lock without holding any task context.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::Mutex;

use crate::error::SchedError;
use crate::ravg::RavgData;

use super::types::{vtime_before, CpuId, CpuMask, DomId, Pid};

// ============================================================================
// Dispatch Queue
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueMode {
    /// Arrival order.
    Fifo,
    /// Smallest vtime first, arrival order among equals.
    Vtime,
}

#[derive(Clone, Copy, Debug)]
pub struct QueueEntry {
    pub pid: Pid,
    /// Arrival sequence in FIFO mode, vtime otherwise.
    pub key: u64,
    pub seq: u64,
    /// CPUs the task may run on.
    pub allowed: CpuMask,
}

/// Sorted, bounded queue. Storage is reserved up front so inserting never
/// allocates.
pub struct DispatchQueue {
    entries: Vec<QueueEntry>,
    capacity: usize,
    next_seq: u64,
    mode: QueueMode,
}

impl DispatchQueue {
    pub fn new(mode: QueueMode, capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            next_seq: 0,
            mode,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn mode(&self) -> QueueMode {
        self.mode
    }

    /// Insert `pid`. `vtime` is ignored in FIFO mode.
    pub fn insert(&mut self, pid: Pid, vtime: u64, allowed: CpuMask) -> Result<(), &'static str> {
        if self.entries.len() >= self.capacity {
            return Err("dispatch queue full");
        }

        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        let key = match self.mode {
            QueueMode::Fifo => seq,
            QueueMode::Vtime => vtime,
        };

        // Keys are compared on the wrapping vtime axis.
        let idx = self
            .entries
            .partition_point(|e| vtime_before(e.key, key) || (e.key == key && e.seq < seq));
        self.entries.insert(idx, QueueEntry { pid, key, seq, allowed });
        Ok(())
    }

    /// Pop the first entry allowed to run on `cpu`.
    pub fn consume(&mut self, cpu: CpuId) -> Option<Pid> {
        let idx = self.entries.iter().position(|e| e.allowed.is_set(cpu))?;
        Some(self.entries.remove(idx).pid)
    }

    pub fn remove(&mut self, pid: Pid) -> bool {
        match self.entries.iter().position(|e| e.pid == pid) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.entries.iter().any(|e| e.pid == pid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }
}

// ============================================================================
// Domain Context
// ============================================================================

/// Sum of runnable weights and its decayed average.
#[derive(Clone, Copy, Debug, Default)]
pub struct DomLoad {
    pub load: u64,
    pub rd: RavgData,
}

impl DomLoad {
    /// Set the summed weight at `now`, folding the previous sum into the
    /// average first.
    pub fn update(&mut self, load: u64, now: u64, half_life: u64) {
        self.rd.accumulate(load, now, half_life);
        self.load = load;
    }
}

#[repr(C, align(64))]
pub struct DomainCtx {
    id: DomId,
    cpus: CpuMask,
    /// Fairness clock. Written with relaxed last-writer-wins semantics.
    vtime_now: AtomicU64,
    queue: Mutex<DispatchQueue>,
    load: Mutex<DomLoad>,
}

impl DomainCtx {
    pub fn new(id: DomId, cpus: CpuMask, mode: QueueMode, capacity: usize) -> Self {
        Self {
            id,
            cpus,
            vtime_now: AtomicU64::new(0),
            queue: Mutex::new(DispatchQueue::new(mode, capacity)),
            load: Mutex::new(DomLoad::default()),
        }
    }

    pub fn id(&self) -> DomId {
        self.id
    }

    pub fn cpus(&self) -> &CpuMask {
        &self.cpus
    }

    #[inline]
    pub fn vtime_now(&self) -> u64 {
        self.vtime_now.load(Ordering::Relaxed)
    }

    /// Move the clock forward to `vtime` if it is ahead. Concurrent callers
    /// may overwrite each other; the error is at most one round.
    #[inline]
    pub fn advance_vtime(&self, vtime: u64) {
        if vtime_before(self.vtime_now(), vtime) {
            self.vtime_now.store(vtime, Ordering::Relaxed);
        }
    }

    pub fn nr_queued(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn insert(&self, pid: Pid, vtime: u64, allowed: CpuMask) -> Result<(), SchedError> {
        self.queue
            .lock()
            .insert(pid, vtime, allowed)
            .map_err(|_| SchedError::QueueFull(self.id))
    }

    /// Pop one task for `cpu` if at least `min_depth` are queued.
    pub fn consume(&self, cpu: CpuId, min_depth: usize) -> Option<Pid> {
        let mut queue = self.queue.lock();
        if queue.len() < min_depth.max(1) {
            return None;
        }
        queue.consume(cpu)
    }

    pub fn remove(&self, pid: Pid) -> bool {
        self.queue.lock().remove(pid)
    }

    pub fn with_queue<R>(&self, f: impl FnOnce(&DispatchQueue) -> R) -> R {
        f(&self.queue.lock())
    }

    pub fn with_load<R>(&self, f: impl FnOnce(&mut DomLoad) -> R) -> R {
        f(&mut self.load.lock())
    }
}
