//! Domain scheduler core
//!
//! `DomainScheduler` owns all engine state and implements the lifecycle,
//! affinity, weight and running/stopping callbacks. CPU selection, enqueue
//! and dispatch live in their own files as further `impl` blocks.
//!
//! ## Error policy
//!
//! Failures during admission are returned to the host and leave no state
//! behind. Failures in the middle of any other callback cannot be
//! recovered locally: they go through `fail()`, which records an error
//! exit, after which every callback returns `SchedError::Exited`.

use alloc::format;
use alloc::vec::Vec;

use crate::config::SchedConfig;
use crate::error::SchedError;
use crate::ravg::Transfer;

use super::domain::{DomainCtx, QueueMode};
use super::exit::{ExitInfo, ExitKind, ExitRecord};
use super::host::SchedHost;
use super::lb::{DomStat, LbAgent, LbTable, TaskStat};
use super::percpu::PcpuCtx;
use super::stats::{StatId, StatsSnapshot};
use super::task::{TaskCtx, TaskTable};
use super::topology::Topology;
use super::types::{
    Admission, CpuId, CpuMask, DomId, Pid, TaskInit, DEFAULT_WEIGHT, MAX_DOMS, MAX_WEIGHT,
    MIN_WEIGHT,
};

pub struct DomainScheduler<H: SchedHost> {
    pub(super) host: H,
    pub(super) config: SchedConfig,
    pub(super) topo: Topology,
    pub(super) doms: Vec<DomainCtx>,
    pub(super) pcpus: Vec<PcpuCtx>,
    pub(super) tasks: TaskTable,
    pub(super) lb: LbTable,
    pub(super) exit: ExitRecord,
}

fn clamp_weight(weight: u32) -> u32 {
    weight.clamp(MIN_WEIGHT, MAX_WEIGHT)
}

impl<H: SchedHost> DomainScheduler<H> {
    pub fn new(host: H, topo: Topology, config: SchedConfig) -> Result<Self, SchedError> {
        config.validate()?;

        let mode = if config.fifo_sched {
            QueueMode::Fifo
        } else {
            QueueMode::Vtime
        };
        let doms = topo
            .doms()
            .map(|(dom, cpus)| DomainCtx::new(dom, *cpus, mode, config.max_tasks))
            .collect();
        let pcpus = (0..topo.nr_cpus() as CpuId).map(PcpuCtx::new).collect();

        crate::kinfo!(
            "dsched: {} cpus in {} domains, {:?} ordering, greedy threshold {}, slice {}ns",
            topo.nr_cpus(),
            topo.nr_doms(),
            mode,
            config.greedy_threshold,
            config.slice_ns
        );

        Ok(Self {
            host,
            tasks: TaskTable::new(config.max_tasks),
            lb: LbTable::new(config.max_tasks),
            exit: ExitRecord::new(),
            config,
            topo,
            doms,
            pcpus,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &SchedConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topo
    }

    pub fn lb(&self) -> &LbTable {
        &self.lb
    }

    pub fn agent(&self) -> LbAgent<'_, H> {
        LbAgent::new(self)
    }

    pub fn domain(&self, dom: DomId) -> Option<&DomainCtx> {
        self.doms.get(dom as usize)
    }

    /// Copy of a task's placement context.
    pub fn task(&self, pid: Pid) -> Option<TaskCtx> {
        self.tasks.get(pid)
    }

    pub fn nr_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_active(&self) -> bool {
        !self.exit.exited()
    }

    pub fn exit_info(&self) -> Option<ExitInfo> {
        self.exit.info()
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    #[inline]
    pub(super) fn ensure_active(&self) -> Result<(), SchedError> {
        if self.exit.exited() {
            return Err(SchedError::Exited);
        }
        Ok(())
    }

    pub(super) fn pcpu(&self, cpu: CpuId) -> Result<&PcpuCtx, SchedError> {
        self.pcpus.get(cpu as usize).ok_or(SchedError::InvalidCpu(cpu))
    }

    pub(super) fn dom_ctx(&self, dom: DomId) -> Result<&DomainCtx, SchedError> {
        self.doms.get(dom as usize).ok_or(SchedError::DomainNotFound(dom))
    }

    #[inline]
    pub(super) fn stat_inc(&self, cpu: CpuId, id: StatId) {
        if let Some(pcpu) = self.pcpus.get(cpu as usize) {
            pcpu.stat_inc(id);
        }
    }

    #[inline]
    pub(super) fn half_life(&self) -> u64 {
        self.config.load_half_life_ns
    }

    /// Abort the policy because of `err` and hand the error back.
    pub(super) fn fail(&self, err: SchedError, what: &str) -> SchedError {
        let msg = format!("{}: {}", what, err);
        crate::kerror!("dsched: {}", msg);
        self.exit.record(ExitKind::Error, &msg);
        err
    }

    /// A callback named a task we have no context for.
    pub(super) fn task_missing(&self, cpu: Option<CpuId>, pid: Pid, what: &str) -> SchedError {
        if let Some(cpu) = cpu {
            self.stat_inc(cpu, StatId::TaskGetErr);
        }
        self.fail(SchedError::TaskNotFound(pid), what)
    }

    /// Run `f` on `pid`'s context; a missing context or an error from `f`
    /// aborts the policy.
    pub(super) fn with_task<R>(
        &self,
        cpu: Option<CpuId>,
        pid: Pid,
        what: &str,
        f: impl FnOnce(&mut TaskCtx) -> Result<R, SchedError>,
    ) -> Result<R, SchedError> {
        match self.tasks.with(pid, f) {
            Some(Ok(r)) => Ok(r),
            Some(Err(err)) => Err(self.fail(err, what)),
            None => Err(self.task_missing(cpu, pid, what)),
        }
    }

    /// Choose a domain for `affinity`, rotating from `pcpu`'s cursor when
    /// several qualify. Also returns the bitmap of qualifying domains.
    pub(super) fn pick_domain(&self, pcpu: &PcpuCtx, affinity: &CpuMask) -> (Option<DomId>, u64) {
        let nr_doms = self.topo.nr_doms() as u32;
        let dom_mask = self.topo.dom_mask_for(affinity);
        if dom_mask == 0 {
            return (None, 0);
        }
        if dom_mask.count_ones() == 1 {
            return (Some(dom_mask.trailing_zeros()), dom_mask);
        }

        let base = pcpu.next_dom_rr();
        for i in 0..nr_doms.min(MAX_DOMS as u32) {
            let dom = base.wrapping_add(i) % nr_doms;
            if dom_mask & (1 << dom) != 0 {
                return (Some(dom), dom_mask);
            }
        }
        (None, dom_mask)
    }

    /// Move `taskc` to `new_dom`, keeping its vtime offset from the domain
    /// clock and carrying its load history along.
    pub(super) fn set_domain(&self, taskc: &mut TaskCtx, new_dom: DomId, now: u64) -> Result<(), SchedError> {
        let old = self.dom_ctx(taskc.dom_id)?;
        let new = self.dom_ctx(new_dom)?;

        if !self.config.fifo_sched {
            let offset = taskc.vtime.wrapping_sub(old.vtime_now());
            taskc.vtime = new.vtime_now().wrapping_add(offset);
        }

        self.transfer_load(taskc, old, new, now);

        crate::kdebug!("dsched: pid {} dom {} -> {}", taskc.pid, taskc.dom_id, new_dom);
        taskc.dom_id = new_dom;
        taskc.cpumask = new.cpus().and(&taskc.affinity);
        Ok(())
    }

    /// The decayed history always follows the task. The instantaneous
    /// weight only moves while the task is runnable.
    fn transfer_load(&self, taskc: &mut TaskCtx, from: &DomainCtx, to: &DomainCtx, now: u64) {
        let hl = self.half_life();
        let weight = taskc.load_contrib();
        taskc.load_rd.accumulate(taskc.load_rd.val, now, hl);

        from.with_load(|l| {
            l.rd.accumulate(l.load, now, hl);
            l.rd.transfer(&mut taskc.load_rd, Transfer::Out, hl);
            l.update(l.load.saturating_sub(weight), now, hl);
        });
        to.with_load(|l| {
            l.rd.accumulate(l.load, now, hl);
            l.rd.transfer(&mut taskc.load_rd, Transfer::In, hl);
            l.update(l.load.saturating_add(weight), now, hl);
        });
    }

    // ========================================================================
    // Task lifecycle
    // ========================================================================

    /// Admit a task. On error nothing is left behind.
    pub fn init_task(&self, cpu: CpuId, init: &TaskInit) -> Result<Admission, SchedError> {
        self.ensure_active()?;
        let pcpu = self.pcpu(cpu)?;

        if self.config.switch_partial && !init.ext_policy {
            crate::ktrace!("dsched: pid {} bypassed", init.pid);
            return Ok(Admission::Bypassed);
        }

        let admit_err = |err: SchedError| {
            pcpu.stat_inc(StatId::TaskGetErr);
            crate::kwarn!("dsched: admission of pid {} failed: {}", init.pid, err);
            err
        };

        if init.affinity.is_empty() {
            return Err(admit_err(SchedError::EmptyCpumask(init.pid)));
        }
        let (dom, dom_mask) = self.pick_domain(pcpu, &init.affinity);
        let Some(dom) = dom else {
            return Err(admit_err(SchedError::NoDomain(init.pid)));
        };
        let domc = self.dom_ctx(dom).map_err(admit_err)?;

        let now = self.host.now_ns();
        let mut taskc = TaskCtx::new(init.pid, init.affinity, clamp_weight(init.weight), init.kthread);
        taskc.dom_id = dom;
        taskc.dom_mask = dom_mask;
        taskc.cpumask = domc.cpus().and(&init.affinity);
        taskc.vtime = domc.vtime_now();
        taskc.cpu = cpu;
        taskc.load_rd.accumulate(0, now, self.half_life());

        self.tasks.insert(taskc).map_err(admit_err)?;
        crate::kdebug!("dsched: pid {} admitted to dom {} (mask {:#x})", init.pid, dom, dom_mask);
        Ok(Admission::Managed(dom))
    }

    /// Release a task's context. Allowed after exit so the host can tear
    /// down.
    pub fn exit_task(&self, pid: Pid) -> Result<(), SchedError> {
        let Some(taskc) = self.tasks.remove(pid) else {
            return Err(SchedError::TaskNotFound(pid));
        };

        self.dequeue(pid);

        if taskc.runnable {
            let now = self.host.now_ns();
            let hl = self.half_life();
            let domc = self.dom_ctx(taskc.dom_id)?;
            domc.with_load(|l| l.update(l.load.saturating_sub(taskc.load_contrib()), now, hl));
        }

        crate::kdebug!("dsched: pid {} released", pid);
        Ok(())
    }

    /// Pull a queued task back out of its domain queue, if it is in one.
    pub fn dequeue(&self, pid: Pid) -> bool {
        self.doms.iter().any(|domc| domc.remove(pid))
    }

    // ========================================================================
    // Affinity and weight
    // ========================================================================

    pub fn set_cpumask(&self, cpu: CpuId, pid: Pid, mask: &CpuMask) -> Result<(), SchedError> {
        self.ensure_active()?;
        let pcpu = self.pcpu(cpu).map_err(|e| self.fail(e, "set_cpumask"))?;
        let now = self.host.now_ns();

        self.with_task(Some(cpu), pid, "set_cpumask", |taskc| {
            let (dom, dom_mask) = self.pick_domain(pcpu, mask);
            let Some(dom) = dom else {
                return Err(SchedError::NoDomain(pid));
            };

            taskc.affinity = *mask;
            taskc.dom_mask = dom_mask;
            if dom != taskc.dom_id {
                self.set_domain(taskc, dom, now)?;
            } else {
                taskc.cpumask = self.dom_ctx(dom)?.cpus().and(mask);
            }

            if taskc.cpumask.is_empty() {
                return Err(SchedError::EmptyCpumask(pid));
            }
            Ok(())
        })
    }

    /// Update the weight. Takes effect on the next charge; nothing is
    /// requeued.
    pub fn set_weight(&self, pid: Pid, weight: u32) -> Result<(), SchedError> {
        self.ensure_active()?;
        let weight = clamp_weight(weight);
        let now = self.host.now_ns();
        let hl = self.half_life();

        self.with_task(None, pid, "set_weight", |taskc| {
            if taskc.runnable {
                let old = taskc.load_rd.val;
                taskc.load_rd.accumulate(weight as u64, now, hl);
                self.dom_ctx(taskc.dom_id)?.with_load(|l| {
                    let load = l.load.saturating_sub(old).saturating_add(weight as u64);
                    l.update(load, now, hl);
                });
            }
            taskc.weight = weight;
            Ok(())
        })
    }

    // ========================================================================
    // Runnable tracking and vtime accounting
    // ========================================================================

    pub fn runnable(&self, cpu: CpuId, pid: Pid) -> Result<(), SchedError> {
        self.ensure_active()?;
        let now = self.host.now_ns();
        let hl = self.half_life();

        self.with_task(Some(cpu), pid, "runnable", |taskc| {
            if taskc.runnable {
                return Ok(());
            }
            let weight = taskc.weight as u64;
            taskc.runnable = true;
            taskc.runnable_at = now;
            taskc.load_rd.accumulate(weight, now, hl);
            self.dom_ctx(taskc.dom_id)?
                .with_load(|l| l.update(l.load.saturating_add(weight), now, hl));
            Ok(())
        })
    }

    pub fn quiescent(&self, cpu: CpuId, pid: Pid) -> Result<(), SchedError> {
        self.ensure_active()?;
        let now = self.host.now_ns();
        let hl = self.half_life();

        self.with_task(Some(cpu), pid, "quiescent", |taskc| {
            if !taskc.runnable {
                return Ok(());
            }
            let contrib = taskc.load_contrib();
            taskc.runnable = false;
            taskc.runnable_for = taskc
                .runnable_for
                .saturating_add(now.saturating_sub(taskc.runnable_at));
            taskc.runnable_at = 0;
            taskc.load_rd.accumulate(0, now, hl);
            self.dom_ctx(taskc.dom_id)?
                .with_load(|l| l.update(l.load.saturating_sub(contrib), now, hl));
            Ok(())
        })
    }

    /// The task starts executing on `cpu`: pull its domain clock forward.
    pub fn running(&self, cpu: CpuId, pid: Pid) -> Result<(), SchedError> {
        self.ensure_active()?;

        self.with_task(Some(cpu), pid, "running", |taskc| {
            taskc.cpu = cpu;
            if self.config.fifo_sched {
                return Ok(());
            }
            self.dom_ctx(taskc.dom_id)?.advance_vtime(taskc.vtime);
            Ok(())
        })
    }

    /// The task stops executing with `remaining_slice_ns` unused: charge the
    /// used part scaled by weight.
    pub fn stopping(&self, cpu: CpuId, pid: Pid, remaining_slice_ns: u64) -> Result<(), SchedError> {
        self.ensure_active()?;
        if self.config.fifo_sched {
            return Ok(());
        }
        let used = self.config.slice_ns.saturating_sub(remaining_slice_ns);

        self.with_task(Some(cpu), pid, "stopping", |taskc| {
            let charge = used.saturating_mul(DEFAULT_WEIGHT as u64) / taskc.weight.max(1) as u64;
            taskc.vtime = taskc.vtime.wrapping_add(charge);
            Ok(())
        })
    }

    // ========================================================================
    // Exit
    // ========================================================================

    /// Stop scheduling under this policy. Only the first exit is kept.
    pub fn exit(&self, kind: ExitKind, msg: &str) {
        if !self.exit.record(kind, msg) {
            crate::kdebug!("dsched: exit {:?} ignored, already exited", kind);
            return;
        }
        if kind.is_error() {
            crate::kerror!("dsched: exit ({}): {}", kind.reason(), msg);
        } else {
            crate::kinfo!("dsched: exit ({}) {}", kind.reason(), msg);
        }
    }

    pub fn unregister(&self) {
        self.exit(ExitKind::Unregistered, "");
    }

    // ========================================================================
    // Reports
    // ========================================================================

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot::collect(self.pcpus.iter().map(PcpuCtx::stats))
    }

    pub fn dom_stat(&self, dom: DomId, now: u64) -> Option<DomStat> {
        let domc = self.domain(dom)?;
        let hl = self.half_life();
        Some(DomStat {
            id: dom,
            nr_cpus: domc.cpus().count(),
            nr_queued: domc.nr_queued(),
            vtime_now: domc.vtime_now(),
            load: domc.with_load(|l| l.rd.read_val(now, hl)),
        })
    }

    pub fn task_stat(&self, pid: Pid, now: u64) -> Option<TaskStat> {
        let hl = self.half_life();
        self.tasks.with(pid, |taskc| Self::task_report(taskc, now, hl))
    }

    pub fn task_stats(&self, now: u64) -> Vec<TaskStat> {
        let hl = self.half_life();
        self.tasks
            .read()
            .values()
            .map(|slot| Self::task_report(&slot.lock(), now, hl))
            .collect()
    }

    fn task_report(taskc: &TaskCtx, now: u64, hl: u64) -> TaskStat {
        TaskStat {
            pid: taskc.pid,
            dom_id: taskc.dom_id,
            dom_mask: taskc.dom_mask,
            weight: taskc.weight,
            runnable_for: taskc.runnable_for,
            load: taskc.load_rd.read_val(now, hl),
        }
    }
}
