//! Per-CPU scheduler context
//!
//! Each CPU owns one `PcpuCtx`. Only code running on that CPU writes it, so
//! relaxed atomics suffice; they exist to make the shared reference `Sync`.

use core::sync::atomic::{AtomicU32, Ordering};

use super::stats::{CpuStats, StatId};
use super::types::CpuId;

#[repr(C, align(64))]
pub struct PcpuCtx {
    cpu: CpuId,
    /// Rotating base for domain scans (greedy stealing, domain picks).
    dom_rr_cur: AtomicU32,
    stats: CpuStats,
}

impl PcpuCtx {
    pub fn new(cpu: CpuId) -> Self {
        Self {
            cpu,
            // Stagger the cursors so CPUs do not all start on domain 0.
            dom_rr_cur: AtomicU32::new(cpu),
            stats: CpuStats::new(),
        }
    }

    pub fn cpu(&self) -> CpuId {
        self.cpu
    }

    /// Advance the cursor and return its new value.
    #[inline]
    pub fn next_dom_rr(&self) -> u32 {
        self.dom_rr_cur.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    #[inline]
    pub fn stat_inc(&self, id: StatId) {
        self.stats.inc(id);
    }

    pub fn stats(&self) -> &CpuStats {
        &self.stats
    }
}
