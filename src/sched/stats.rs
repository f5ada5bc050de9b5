//! Scheduler statistics
//!
//! Counters are kept per CPU so the hot path never contends on a shared
//! cache line. They only ever grow, saturating at `u64::MAX`. The agent
//! reads them through `StatsSnapshot`, which sums across CPUs.

use core::sync::atomic::{AtomicU64, Ordering};

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatId {
    /// Task context lookup failed.
    TaskGetErr,
    /// Sync wakeup placed on the waker's CPU.
    WakeSync,
    /// Previous CPU was idle.
    PrevIdle,
    /// Single-CPU affinity.
    Pinned,
    DirectDispatch,
    DsqDispatch,
    Greedy,
    LoadBalance,
    LastTask,
}

pub const NR_STATS: usize = 9;

impl StatId {
    pub const ALL: [StatId; NR_STATS] = [
        StatId::TaskGetErr,
        StatId::WakeSync,
        StatId::PrevIdle,
        StatId::Pinned,
        StatId::DirectDispatch,
        StatId::DsqDispatch,
        StatId::Greedy,
        StatId::LoadBalance,
        StatId::LastTask,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            StatId::TaskGetErr => "task_get_err",
            StatId::WakeSync => "wake_sync",
            StatId::PrevIdle => "prev_idle",
            StatId::Pinned => "pinned",
            StatId::DirectDispatch => "direct_dispatch",
            StatId::DsqDispatch => "dsq_dispatch",
            StatId::Greedy => "greedy",
            StatId::LoadBalance => "load_balance",
            StatId::LastTask => "last_task",
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One CPU's counters.
pub struct CpuStats {
    counters: [AtomicU64; NR_STATS],
}

impl CpuStats {
    pub fn new() -> Self {
        Self {
            counters: core::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    #[inline]
    pub fn add(&self, id: StatId, n: u64) {
        let _ = self.counters[id.index()].fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
            Some(v.saturating_add(n))
        });
    }

    #[inline]
    pub fn inc(&self, id: StatId) {
        self.add(id, 1);
    }

    pub fn get(&self, id: StatId) -> u64 {
        self.counters[id.index()].load(Ordering::Relaxed)
    }
}

impl Default for CpuStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time totals across all CPUs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    counters: [u64; NR_STATS],
}

impl StatsSnapshot {
    pub fn collect<'a>(cpus: impl IntoIterator<Item = &'a CpuStats>) -> Self {
        let mut snap = Self::default();
        for cpu in cpus {
            for id in StatId::ALL {
                let slot = &mut snap.counters[id.index()];
                *slot = slot.saturating_add(cpu.get(id));
            }
        }
        snap
    }

    pub fn get(&self, id: StatId) -> u64 {
        self.counters[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (StatId, u64)> + '_ {
        StatId::ALL.into_iter().map(move |id| (id, self.get(id)))
    }

    /// Increments since `prev`.
    pub fn delta(&self, prev: &StatsSnapshot) -> StatsSnapshot {
        let mut out = *self;
        for (cur, old) in out.counters.iter_mut().zip(prev.counters.iter()) {
            *cur = cur.saturating_sub(*old);
        }
        out
    }

    pub fn total(&self) -> u64 {
        self.counters.iter().fold(0u64, |acc, &v| acc.saturating_add(v))
    }
}
