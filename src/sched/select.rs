//! CPU selection for waking tasks

use crate::error::SchedError;

use super::core::DomainScheduler;
use super::host::SchedHost;
use super::stats::StatId;
use super::types::{CpuId, Pid, WakeFlags};

impl<H: SchedHost> DomainScheduler<H> {
    /// Pick a CPU for `pid`, which last ran on `prev_cpu`, woken from `cpu`.
    ///
    /// In order:
    /// 1. single allowed CPU: that CPU, dispatched locally
    /// 2. sync wakeup with an idle CPU in the waker's domain: the waker's CPU
    /// 3. idle `prev_cpu`: `prev_cpu`
    /// 4. any idle eligible CPU
    /// 5. `prev_cpu` if eligible, else the first eligible CPU
    ///
    /// Outcomes 1 to 4 mark the task for direct local dispatch.
    pub fn select_cpu(
        &self,
        cpu: CpuId,
        pid: Pid,
        prev_cpu: CpuId,
        wake_flags: WakeFlags,
    ) -> Result<CpuId, SchedError> {
        self.ensure_active()?;
        let pcpu = self.pcpu(cpu).map_err(|e| self.fail(e, "select_cpu"))?;

        self.with_task(Some(cpu), pid, "select_cpu", |taskc| {
            let nr_allowed = taskc.affinity.count();

            let (target, local) = if nr_allowed == 1 {
                let Some(only) = taskc.affinity.first_set() else {
                    return Err(SchedError::EmptyCpumask(pid));
                };
                pcpu.stat_inc(StatId::Pinned);
                (only, true)
            } else if let Some(target) = self.select_sync(cpu, taskc.affinity.is_set(cpu), wake_flags) {
                pcpu.stat_inc(StatId::WakeSync);
                (target, true)
            } else if taskc.affinity.is_set(prev_cpu) && self.host.test_and_clear_cpu_idle(prev_cpu) {
                pcpu.stat_inc(StatId::PrevIdle);
                (prev_cpu, true)
            } else if let Some(idle) = self.host.pick_idle_cpu(&taskc.cpumask) {
                (idle, true)
            } else if taskc.cpumask.is_set(prev_cpu) {
                (prev_cpu, false)
            } else {
                let Some(first) = taskc.cpumask.first_set() else {
                    return Err(SchedError::EmptyCpumask(pid));
                };
                (first, false)
            };

            if local {
                taskc.dispatch_local = true;
            }
            taskc.cpu = target;
            crate::ktrace!("dsched: select pid {} -> cpu {} local={}", pid, target, local);
            Ok(target)
        })
    }

    /// Waker's CPU for a sync wakeup, if its domain has an idle CPU and the
    /// wakee may run there.
    fn select_sync(&self, cpu: CpuId, allowed_here: bool, wake_flags: WakeFlags) -> Option<CpuId> {
        if !wake_flags.contains(WakeFlags::SYNC) || !allowed_here {
            return None;
        }
        let dom = self.topo.cpu_to_dom(cpu)?;
        let dom_cpus = self.topo.dom_cpus(dom)?;
        if dom_cpus.intersects(&self.host.idle_cpumask()) {
            Some(cpu)
        } else {
            None
        }
    }
}
