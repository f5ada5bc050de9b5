//! Host scheduler core interface
//!
//! The engine never blocks on the host. Every method is either a bounded
//! query or a fire-and-forget signal.

use super::types::{CpuId, CpuMask, Pid};

pub trait SchedHost: Sync {
    /// Monotonic clock in nanoseconds.
    fn now_ns(&self) -> u64;

    /// CPUs currently idle.
    fn idle_cpumask(&self) -> CpuMask;

    /// Claim `cpu` if it is idle. Returns whether the claim succeeded.
    fn test_and_clear_cpu_idle(&self, cpu: CpuId) -> bool;

    /// Claim some idle CPU in `mask`.
    fn pick_idle_cpu(&self, mask: &CpuMask) -> Option<CpuId> {
        let candidates = self.idle_cpumask().and(mask);
        let cpu = candidates
            .iter_set()
            .find(|&cpu| self.test_and_clear_cpu_idle(cpu));
        cpu
    }

    /// Make `cpu` reschedule.
    fn kick_cpu(&self, cpu: CpuId);

    /// Place `pid` on `cpu`'s local run slot for `slice_ns`.
    fn dispatch_local(&self, cpu: CpuId, pid: Pid, slice_ns: u64);
}
