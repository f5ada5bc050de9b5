//! Mock host scheduler core
//!
//! Simulates the host side of the callback interface: a settable clock, an
//! idle CPU mask, and a log of kicks and local dispatches.

use std::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use crate::sched::{CpuId, CpuMask, Pid, SchedHost};

/// One `dispatch_local` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalDispatch {
    pub cpu: CpuId,
    pub pid: Pid,
    pub slice_ns: u64,
}

pub struct MockHost {
    now: AtomicU64,
    idle: Mutex<CpuMask>,
    kicks: Mutex<Vec<CpuId>>,
    dispatched: Mutex<Vec<LocalDispatch>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            now: AtomicU64::new(0),
            idle: Mutex::new(CpuMask::empty()),
            kicks: Mutex::new(Vec::new()),
            dispatched: Mutex::new(Vec::new()),
        }
    }

    pub fn set_now(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: u64) -> u64 {
        self.now.fetch_add(delta, Ordering::SeqCst) + delta
    }

    pub fn set_idle(&self, cpus: &[CpuId]) {
        *self.idle.lock() = CpuMask::from_cpus(cpus);
    }

    pub fn clear_idle(&self) {
        *self.idle.lock() = CpuMask::empty();
    }

    pub fn is_idle(&self, cpu: CpuId) -> bool {
        self.idle.lock().is_set(cpu)
    }

    pub fn kicks(&self) -> Vec<CpuId> {
        self.kicks.lock().clone()
    }

    pub fn dispatched(&self) -> Vec<LocalDispatch> {
        self.dispatched.lock().clone()
    }

    pub fn take_dispatched(&self) -> Vec<LocalDispatch> {
        std::mem::take(&mut *self.dispatched.lock())
    }

    pub fn last_dispatch(&self) -> Option<LocalDispatch> {
        self.dispatched.lock().last().copied()
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedHost for MockHost {
    fn now_ns(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn idle_cpumask(&self) -> CpuMask {
        *self.idle.lock()
    }

    fn test_and_clear_cpu_idle(&self, cpu: CpuId) -> bool {
        let mut idle = self.idle.lock();
        if idle.is_set(cpu) {
            idle.clear(cpu);
            true
        } else {
            false
        }
    }

    fn kick_cpu(&self, cpu: CpuId) {
        self.kicks.lock().push(cpu);
    }

    fn dispatch_local(&self, cpu: CpuId, pid: Pid, slice_ns: u64) {
        self.dispatched.lock().push(LocalDispatch { cpu, pid, slice_ns });
    }
}
