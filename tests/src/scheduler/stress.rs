//! Scheduler Stress Tests
//!
//! Concurrent callbacks from several threads standing in for CPUs, with a
//! balancing agent writing directives at the same time. Checks that no
//! task is lost or duplicated and that no lookup ever fails.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use super::{admit, all_cpus, cpus, make_sched, test_config};
use crate::mock::MockHost;
use crate::sched::{CpuId, DomainScheduler, EnqFlags, Pid, StatId, TaskInit};

const NR_CPUS: usize = 8;
const NR_THREADS: usize = 4;

fn queued_pids(sched: &DomainScheduler<MockHost>) -> Vec<Pid> {
    let mut pids = Vec::new();
    for dom in 0..sched.topology().nr_doms() as u32 {
        sched
            .domain(dom)
            .unwrap()
            .with_queue(|q| pids.extend(q.iter().map(|e| e.pid)));
    }
    pids
}

#[test]
fn test_concurrent_dispatch_enqueue_with_agent() {
    const NR_TASKS: Pid = 64;
    const ROUNDS: usize = 500;

    let mut config = test_config();
    config.greedy_threshold = 1;
    let sched = Arc::new(make_sched(NR_CPUS, 2, config));

    for pid in 1..=NR_TASKS {
        admit(&sched, (pid % NR_CPUS as u64) as CpuId, pid, all_cpus(&sched));
        sched.runnable(0, pid).unwrap();
        sched.enqueue(0, pid, EnqFlags::WAKEUP).unwrap();
    }

    let barrier = Arc::new(Barrier::new(NR_THREADS + 1));
    let done = Arc::new(AtomicBool::new(false));
    let mut handles = vec![];

    // Each thread drives one CPU from each domain.
    for t in 0..NR_THREADS {
        let sched = Arc::clone(&sched);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            let my_cpus = [t as CpuId, (t + NR_THREADS) as CpuId];
            barrier.wait();
            for round in 0..ROUNDS {
                let cpu = my_cpus[round % 2];
                let Some(pid) = sched.dispatch(cpu).unwrap().pid() else {
                    continue;
                };
                sched.running(cpu, pid).unwrap();
                sched.stopping(cpu, pid, (round as u64 % 5) * 1_000_000).unwrap();

                // The running task changes its own affinity now and then.
                if round % 7 == 0 {
                    let mask = if round % 14 == 0 {
                        cpus(&[0, 1, 2, 3])
                    } else {
                        all_cpus(&sched)
                    };
                    sched.set_cpumask(cpu, pid, &mask).unwrap();
                }
                if round % 11 == 0 {
                    sched.set_weight(pid, 50 + (round as u32 % 200)).unwrap();
                }

                sched.enqueue(cpu, pid, EnqFlags::empty()).unwrap();
            }
        }));
    }

    // Balancing agent.
    let agent = {
        let sched = Arc::clone(&sched);
        let barrier = Arc::clone(&barrier);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            barrier.wait();
            let mut round = 0u64;
            while !done.load(Ordering::Acquire) {
                let agent = sched.agent();
                agent.clear_directives();
                let _ = agent.dom_stats(round);
                for stat in agent.task_stats(round).iter().take(8) {
                    let target = (stat.dom_id + 1) % 2;
                    let _ = agent.request_migration(stat.pid, target);
                }
                round += 1;
                thread::yield_now();
            }
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    done.store(true, Ordering::Release);
    agent.join().unwrap();

    assert!(sched.is_active(), "engine exited: {:?}", sched.exit_info());
    assert_eq!(sched.stats().get(StatId::TaskGetErr), 0);

    let pids = queued_pids(&sched);
    let unique: BTreeSet<Pid> = pids.iter().copied().collect();
    assert_eq!(pids.len(), NR_TASKS as usize, "tasks lost or duplicated");
    assert_eq!(unique.len(), NR_TASKS as usize);

    for pid in 1..=NR_TASKS {
        super::assert_placement_invariant(&sched, pid);
        let dom = sched.task(pid).unwrap().dom_id;
        assert!(
            sched.domain(dom).unwrap().with_queue(|q| q.contains(pid)),
            "pid {} queued outside its domain",
            pid
        );
    }

    // Load bookkeeping survived the moves.
    let total: u64 = (0..2)
        .map(|dom| sched.domain(dom).unwrap().with_load(|l| l.load))
        .sum();
    let weights: u64 = (1..=NR_TASKS)
        .map(|pid| sched.task(pid).unwrap().weight as u64)
        .sum();
    assert_eq!(total, weights);
}

#[test]
fn test_concurrent_admission_and_release() {
    const PER_THREAD: u64 = 200;

    let sched = Arc::new(make_sched(NR_CPUS, 4, test_config()));
    let barrier = Arc::new(Barrier::new(NR_THREADS));
    let mut handles = vec![];

    for t in 0..NR_THREADS {
        let sched = Arc::clone(&sched);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            let cpu = (t * 2) as CpuId;
            let base = (t as u64 + 1) * 10_000;
            barrier.wait();
            for i in 0..PER_THREAD {
                let pid = base + i;
                let affinity = all_cpus(&sched);
                sched.init_task(cpu, &TaskInit::new(pid, affinity)).unwrap();
                sched.runnable(cpu, pid).unwrap();
                sched.enqueue(cpu, pid, EnqFlags::WAKEUP).unwrap();
                // Release every other task straight away.
                if i % 2 == 0 {
                    sched.exit_task(pid).unwrap();
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let expected = NR_THREADS * PER_THREAD as usize / 2;
    assert_eq!(sched.nr_tasks(), expected);
    assert_eq!(queued_pids(&sched).len(), expected);

    let total: u64 = (0..4)
        .map(|dom| sched.domain(dom).unwrap().with_load(|l| l.load))
        .sum();
    assert_eq!(total, expected as u64 * 100);
    assert!(sched.is_active());
}

#[test]
fn test_concurrent_stat_counting() {
    const PER_THREAD: u64 = 1000;

    let sched = Arc::new(make_sched(NR_CPUS, 2, test_config()));
    for t in 0..NR_THREADS as u64 {
        admit(&sched, 0, t + 1, all_cpus(&sched));
    }

    let barrier = Arc::new(Barrier::new(NR_THREADS));
    let mut handles = vec![];
    for t in 0..NR_THREADS {
        let sched = Arc::clone(&sched);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            let pid = t as u64 + 1;
            barrier.wait();
            for i in 0..PER_THREAD {
                // Two threads share each CPU.
                let cpu = ((t + i as usize) % 2) as CpuId;
                sched.enqueue(cpu, pid, EnqFlags::LAST).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        sched.stats().get(StatId::LastTask),
        NR_THREADS as u64 * PER_THREAD
    );
    assert_eq!(sched.host().dispatched().len(), NR_THREADS * PER_THREAD as usize);
}
