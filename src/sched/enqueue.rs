//! Enqueue: direct dispatch, domain queues and directive-driven transfers

use crate::error::SchedError;

use super::core::DomainScheduler;
use super::host::SchedHost;
use super::stats::StatId;
use super::task::TaskCtx;
use super::types::{vtime_before, CpuId, DomId, EnqFlags, Enqueued, Pid};

impl<H: SchedHost> DomainScheduler<H> {
    /// Queue `pid`, called on `cpu`.
    pub fn enqueue(&self, cpu: CpuId, pid: Pid, enq_flags: EnqFlags) -> Result<Enqueued, SchedError> {
        self.ensure_active()?;
        self.pcpu(cpu).map_err(|e| self.fail(e, "enqueue"))?;
        let slice = self.config.slice_ns;

        self.with_task(Some(cpu), pid, "enqueue", |taskc| {
            if let Some(new_dom) = self.lb.lookup(pid) {
                if new_dom != taskc.dom_id && self.try_transfer(taskc, new_dom)? {
                    self.stat_inc(cpu, StatId::LoadBalance);

                    // The CPU picked at select time is no longer in the task's
                    // domain; poke it so it does not wait for this task.
                    if core::mem::take(&mut taskc.dispatch_local) {
                        self.host.kick_cpu(taskc.cpu);
                    }
                    if let Some(idle) = self.host.pick_idle_cpu(&taskc.cpumask) {
                        self.host.kick_cpu(idle);
                    }

                    let dom = self.queue_on_domain(cpu, taskc)?;
                    return Ok(Enqueued::Queued { dom, migrated: true });
                }
            }

            if enq_flags.contains(EnqFlags::LAST) {
                taskc.dispatch_local = false;
                self.stat_inc(cpu, StatId::LastTask);
                self.host.dispatch_local(cpu, pid, slice);
                return Ok(Enqueued::Local);
            }

            let pinned_kthread = self.config.kthreads_local && taskc.kthread && taskc.is_pinned();
            if core::mem::take(&mut taskc.dispatch_local) || pinned_kthread {
                self.stat_inc(cpu, StatId::DirectDispatch);
                self.host.dispatch_local(cpu, pid, slice);
                return Ok(Enqueued::Local);
            }

            let dom = self.queue_on_domain(cpu, taskc)?;
            Ok(Enqueued::Queued { dom, migrated: false })
        })
    }

    /// Honor a directive unless the target no longer overlaps the task's
    /// affinity. Returns whether the task moved.
    fn try_transfer(&self, taskc: &mut TaskCtx, new_dom: DomId) -> Result<bool, SchedError> {
        let target = self.dom_ctx(new_dom)?;
        if !target.cpus().intersects(&taskc.affinity) {
            crate::kdebug!(
                "dsched: stale directive pid {} -> dom {} ignored",
                taskc.pid,
                new_dom
            );
            return Ok(false);
        }

        self.set_domain(taskc, new_dom, self.host.now_ns())?;
        Ok(true)
    }

    /// Insert into the task's domain queue. In vtime mode the task's vtime is
    /// first limited to one slice behind the domain clock.
    fn queue_on_domain(&self, cpu: CpuId, taskc: &mut TaskCtx) -> Result<DomId, SchedError> {
        let domc = self.dom_ctx(taskc.dom_id)?;

        if !self.config.fifo_sched {
            let floor = domc.vtime_now().wrapping_sub(self.config.slice_ns);
            if vtime_before(taskc.vtime, floor) {
                taskc.vtime = floor;
            }
        }

        domc.insert(taskc.pid, taskc.vtime, taskc.affinity)?;
        self.stat_inc(cpu, StatId::DsqDispatch);
        crate::ktrace!("dsched: pid {} queued on dom {} vtime {}", taskc.pid, taskc.dom_id, taskc.vtime);
        Ok(taskc.dom_id)
    }
}
