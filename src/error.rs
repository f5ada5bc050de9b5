//! Scheduler error type
//!
//! Errors are small `Copy` values so they can be returned from hot-path
//! callbacks without allocation. `to_errno()` gives the negative POSIX
//! errno the host reports upward.

use core::fmt;

use crate::sched::types::{CpuId, DomId, Pid};

/// POSIX errno values used by the engine.
pub mod errno {
    pub const ENOENT: i32 = 2; // No such file or directory
    pub const ENOMEM: i32 = 12; // Out of memory
    pub const EEXIST: i32 = 17; // File exists
    pub const ENODEV: i32 = 19; // No such device
    pub const EINVAL: i32 = 22; // Invalid argument
    pub const ENOSPC: i32 = 28; // No space left on device
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// No placement context for this task.
    TaskNotFound(Pid),
    /// Domain id outside the topology.
    DomainNotFound(DomId),
    /// CPU id outside the topology.
    InvalidCpu(CpuId),
    /// The task's affinity intersects no domain.
    NoDomain(Pid),
    /// The task has no eligible CPU left.
    EmptyCpumask(Pid),
    TaskExists(Pid),
    /// Task table is at capacity.
    TableFull,
    /// A domain dispatch queue is at capacity.
    QueueFull(DomId),
    /// The agent already issued a directive for this task this round.
    DirectiveExists(Pid),
    InvalidTopology(&'static str),
    InvalidConfig(&'static str),
    /// The policy has exited; no further callbacks are served.
    Exited,
}

impl SchedError {
    pub const fn to_errno(&self) -> i32 {
        let errno = match self {
            SchedError::TaskNotFound(_) | SchedError::DomainNotFound(_) => errno::ENOENT,
            SchedError::InvalidCpu(_)
            | SchedError::NoDomain(_)
            | SchedError::EmptyCpumask(_)
            | SchedError::InvalidTopology(_)
            | SchedError::InvalidConfig(_) => errno::EINVAL,
            SchedError::TaskExists(_) | SchedError::DirectiveExists(_) => errno::EEXIST,
            SchedError::TableFull => errno::ENOMEM,
            SchedError::QueueFull(_) => errno::ENOSPC,
            SchedError::Exited => errno::ENODEV,
        };
        -errno
    }

    /// Errors that end the policy when they happen mid-operation.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchedError::TaskNotFound(_)
                | SchedError::DomainNotFound(_)
                | SchedError::InvalidCpu(_)
                | SchedError::NoDomain(_)
                | SchedError::EmptyCpumask(_)
                | SchedError::QueueFull(_)
        )
    }
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::TaskNotFound(pid) => write!(f, "no task context for pid {}", pid),
            SchedError::DomainNotFound(dom) => write!(f, "domain {} does not exist", dom),
            SchedError::InvalidCpu(cpu) => write!(f, "cpu {} is outside the topology", cpu),
            SchedError::NoDomain(pid) => write!(f, "affinity of pid {} intersects no domain", pid),
            SchedError::EmptyCpumask(pid) => write!(f, "pid {} has no eligible cpu", pid),
            SchedError::TaskExists(pid) => write!(f, "pid {} is already admitted", pid),
            SchedError::TableFull => f.write_str("task table full"),
            SchedError::QueueFull(dom) => write!(f, "dispatch queue of domain {} full", dom),
            SchedError::DirectiveExists(pid) => write!(f, "directive for pid {} already pending", pid),
            SchedError::InvalidTopology(why) => write!(f, "invalid topology: {}", why),
            SchedError::InvalidConfig(why) => write!(f, "invalid config: {}", why),
            SchedError::Exited => f.write_str("scheduler has exited"),
        }
    }
}
