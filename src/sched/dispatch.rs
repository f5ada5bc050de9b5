//! Dispatch: feed an idle CPU from its domain, or steal greedily

use crate::error::SchedError;

use super::core::DomainScheduler;
use super::host::SchedHost;
use super::stats::StatId;
use super::types::{CpuId, DomId, Dispatched, Pid, MAX_DOMS};

impl<H: SchedHost> DomainScheduler<H> {
    /// `cpu` ran out of work. Drain one task from its own domain; failing
    /// that, visit each of the `nr_doms - 1` other domains once, starting at
    /// the CPU's rotation cursor, and take one task from the first whose
    /// backlog reaches the greedy threshold.
    pub fn dispatch(&self, cpu: CpuId) -> Result<Dispatched, SchedError> {
        self.ensure_active()?;
        let pcpu = self.pcpu(cpu).map_err(|e| self.fail(e, "dispatch"))?;
        let Some(own) = self.topo.cpu_to_dom(cpu) else {
            return Err(self.fail(SchedError::InvalidCpu(cpu), "dispatch"));
        };

        if let Some(pid) = self.consume(cpu, own, 1) {
            return Ok(Dispatched::Local(pid));
        }

        let threshold = self.config.greedy_threshold;
        if threshold == 0 {
            return Ok(Dispatched::Idle);
        }

        let nr_doms = self.topo.nr_doms() as u32;
        let nr_foreign = nr_doms.saturating_sub(1).min(MAX_DOMS as u32);
        for _ in 0..nr_foreign {
            // Rotates over the foreign domains only.
            let dom = (own + 1 + pcpu.next_dom_rr() % nr_foreign) % nr_doms;
            if let Some(pid) = self.consume(cpu, dom, threshold as usize) {
                pcpu.stat_inc(StatId::Greedy);
                crate::ktrace!("dsched: cpu {} stole pid {} from dom {}", cpu, pid, dom);
                return Ok(Dispatched::Greedy { pid, from: dom });
            }
        }

        Ok(Dispatched::Idle)
    }

    fn consume(&self, cpu: CpuId, dom: DomId, min_depth: usize) -> Option<Pid> {
        let pid = self.domain(dom)?.consume(cpu, min_depth)?;
        self.host.dispatch_local(cpu, pid, self.config.slice_ns);
        Some(pid)
    }
}
