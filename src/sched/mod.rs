//! Domain scheduler engine
//!
//! CPUs are split into domains. Each domain has one dispatch queue, FIFO or
//! ordered by virtual time, and one virtual-time clock. Waking tasks are
//! placed on an idle CPU when one is available, otherwise queued on their
//! domain. Idle CPUs drain their own domain first and steal from backlogged
//! foreign domains only past a configurable queue depth.
//!
//! ## Concurrency
//!
//! Every callback may run on any CPU at the same time as any other. Domain
//! queues and domain load are each behind their own spin lock, task
//! contexts behind a per-task lock, and per-CPU state is written only by
//! its CPU. The domain clock is a relaxed atomic; racing updates may lose
//! one advance, which the next `running` call repairs.
//!
//! ## Module Organization
//!
//! - `types`: identifiers, `CpuMask`, callback flags and results
//! - `topology`: static CPU-to-domain partition
//! - `domain`: domain context and its dispatch queue
//! - `percpu`: per-CPU rotation cursor and counters
//! - `task`: per-task placement contexts
//! - `stats`: counter ids and snapshots
//! - `lb`: directive table and the balancing agent's view
//! - `exit`: exit kinds and the exit record
//! - `host`: the host scheduler core interface
//! - `core`: engine state, lifecycle, affinity/weight, vtime accounting
//! - `select`, `enqueue`, `dispatch`: the placement hot paths

mod core;
mod dispatch;
pub mod domain;
mod enqueue;
pub mod exit;
pub mod host;
pub mod lb;
pub mod percpu;
mod select;
pub mod stats;
pub mod task;
pub mod topology;
pub mod types;

pub use self::core::DomainScheduler;
pub use domain::{DomLoad, DomainCtx, QueueMode};
pub use exit::{ExitInfo, ExitKind, EXIT_MSG_LEN};
pub use host::SchedHost;
pub use lb::{DomStat, LbAgent, LbTable, TaskStat};
pub use stats::{StatId, StatsSnapshot, NR_STATS};
pub use task::TaskCtx;
pub use topology::Topology;
pub use types::{
    vtime_before, Admission, CpuId, CpuMask, Dispatched, DomId, EnqFlags, Enqueued, Pid,
    TaskInit, WakeFlags, DEFAULT_WEIGHT, MAX_CPUS, MAX_DOMS, MAX_WEIGHT, MIN_WEIGHT,
};
