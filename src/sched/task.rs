//! Per-task placement contexts
//!
//! One `TaskCtx` per managed task, keyed by pid. Admission and removal take
//! the table's write lock; every other path takes the read lock and then
//! the task's own mutex, so callbacks for different tasks never serialize
//! on each other.

use alloc::collections::BTreeMap;
use spin::{Mutex, RwLock, RwLockReadGuard};

use crate::error::SchedError;
use crate::ravg::RavgData;

use super::types::{CpuId, CpuMask, DomId, Pid};

#[derive(Clone, Copy, Debug)]
pub struct TaskCtx {
    pub pid: Pid,
    /// Domain the task currently belongs to.
    pub dom_id: DomId,
    /// Domains the affinity intersects, one bit per domain.
    pub dom_mask: u64,
    /// Host-provided affinity.
    pub affinity: CpuMask,
    /// `affinity` restricted to the current domain.
    pub cpumask: CpuMask,
    pub weight: u32,
    pub kthread: bool,
    pub vtime: u64,
    /// Dispatch straight to the enqueuing CPU.
    pub dispatch_local: bool,
    /// Last CPU the task was placed on.
    pub cpu: CpuId,
    pub runnable: bool,
    pub runnable_at: u64,
    /// Total time spent runnable.
    pub runnable_for: u64,
    /// Decayed average of the weight while runnable.
    pub load_rd: RavgData,
}

impl TaskCtx {
    pub fn new(pid: Pid, affinity: CpuMask, weight: u32, kthread: bool) -> Self {
        Self {
            pid,
            dom_id: 0,
            dom_mask: 0,
            affinity,
            cpumask: CpuMask::empty(),
            weight,
            kthread,
            vtime: 0,
            dispatch_local: false,
            cpu: 0,
            runnable: false,
            runnable_at: 0,
            runnable_for: 0,
            load_rd: RavgData::new(),
        }
    }

    /// Weight currently counted in the domain's load.
    pub fn load_contrib(&self) -> u64 {
        if self.runnable {
            self.load_rd.val
        } else {
            0
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.affinity.count() == 1
    }
}

pub struct TaskTable {
    tasks: RwLock<BTreeMap<Pid, Mutex<TaskCtx>>>,
    capacity: usize,
}

impl TaskTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            tasks: RwLock::new(BTreeMap::new()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    pub fn insert(&self, ctx: TaskCtx) -> Result<(), SchedError> {
        let mut tasks = self.tasks.write();
        if tasks.contains_key(&ctx.pid) {
            return Err(SchedError::TaskExists(ctx.pid));
        }
        if tasks.len() >= self.capacity {
            return Err(SchedError::TableFull);
        }
        tasks.insert(ctx.pid, Mutex::new(ctx));
        Ok(())
    }

    pub fn remove(&self, pid: Pid) -> Option<TaskCtx> {
        self.tasks.write().remove(&pid).map(Mutex::into_inner)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.tasks.read().contains_key(&pid)
    }

    /// Run `f` on the task's context with its lock held.
    pub fn with<R>(&self, pid: Pid, f: impl FnOnce(&mut TaskCtx) -> R) -> Option<R> {
        let tasks = self.tasks.read();
        let slot = tasks.get(&pid)?;
        let mut ctx = slot.lock();
        Some(f(&mut ctx))
    }

    /// Copy of the task's context.
    pub fn get(&self, pid: Pid) -> Option<TaskCtx> {
        self.with(pid, |ctx| *ctx)
    }

    /// Read access to every slot, for reporting.
    pub fn read(&self) -> RwLockReadGuard<'_, BTreeMap<Pid, Mutex<TaskCtx>>> {
        self.tasks.read()
    }
}
