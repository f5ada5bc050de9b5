//! Scheduler type definitions
//!
//! Identifiers, CPU masks and callback flags shared by the whole engine.

use bitflags::bitflags;

pub type Pid = u64;
pub type CpuId = u32;
pub type DomId = u32;

/// Maximum number of CPUs a topology may describe.
pub const MAX_CPUS: usize = 512;

/// Maximum number of domains. Domain eligibility is kept in a u64.
pub const MAX_DOMS: usize = 64;

pub const DEFAULT_WEIGHT: u32 = 100;
pub const MIN_WEIGHT: u32 = 1;
pub const MAX_WEIGHT: u32 = 10_000;

const MASK_WORDS: usize = MAX_CPUS / 64;

/// Fixed-size CPU bitmap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuMask {
    bits: [u64; MASK_WORDS],
}

impl CpuMask {
    pub const fn empty() -> Self {
        Self { bits: [0; MASK_WORDS] }
    }

    /// CPUs `0..nr_cpus`.
    pub fn first_n(nr_cpus: usize) -> Self {
        let mut mask = Self::empty();
        for cpu in 0..nr_cpus.min(MAX_CPUS) {
            mask.set(cpu as CpuId);
        }
        mask
    }

    pub fn from_cpus(cpus: &[CpuId]) -> Self {
        let mut mask = Self::empty();
        for &cpu in cpus {
            mask.set(cpu);
        }
        mask
    }

    /// Out-of-range CPUs are ignored.
    #[inline]
    pub fn set(&mut self, cpu: CpuId) {
        let cpu = cpu as usize;
        if cpu < MAX_CPUS {
            self.bits[cpu / 64] |= 1 << (cpu % 64);
        }
    }

    #[inline]
    pub fn clear(&mut self, cpu: CpuId) {
        let cpu = cpu as usize;
        if cpu < MAX_CPUS {
            self.bits[cpu / 64] &= !(1 << (cpu % 64));
        }
    }

    #[inline]
    pub fn is_set(&self, cpu: CpuId) -> bool {
        let cpu = cpu as usize;
        cpu < MAX_CPUS && self.bits[cpu / 64] & (1 << (cpu % 64)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }

    pub fn count(&self) -> u32 {
        self.bits.iter().map(|w| w.count_ones()).sum()
    }

    pub fn and(&self, other: &CpuMask) -> CpuMask {
        let mut out = *self;
        for (w, o) in out.bits.iter_mut().zip(other.bits.iter()) {
            *w &= *o;
        }
        out
    }

    pub fn or(&self, other: &CpuMask) -> CpuMask {
        let mut out = *self;
        for (w, o) in out.bits.iter_mut().zip(other.bits.iter()) {
            *w |= *o;
        }
        out
    }

    pub fn intersects(&self, other: &CpuMask) -> bool {
        self.bits.iter().zip(other.bits.iter()).any(|(a, b)| a & b != 0)
    }

    pub fn is_subset_of(&self, other: &CpuMask) -> bool {
        self.bits.iter().zip(other.bits.iter()).all(|(a, b)| a & !b == 0)
    }

    pub fn first_set(&self) -> Option<CpuId> {
        self.bits
            .iter()
            .enumerate()
            .find(|(_, w)| **w != 0)
            .map(|(i, w)| (i * 64) as CpuId + w.trailing_zeros())
    }

    pub fn iter_set(&self) -> impl Iterator<Item = CpuId> + '_ {
        self.bits.iter().enumerate().flat_map(|(i, &word)| {
            let mut w = word;
            core::iter::from_fn(move || {
                if w == 0 {
                    return None;
                }
                let bit = w.trailing_zeros();
                w &= w - 1;
                Some((i * 64) as CpuId + bit)
            })
        })
    }
}

bitflags! {
    /// Hints passed with a wakeup.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct WakeFlags: u64 {
        /// The waker is about to sleep; running the wakee here is cheap.
        const SYNC = 1 << 0;
        /// First wakeup after fork.
        const FORK = 1 << 1;
    }
}

bitflags! {
    /// Hints passed with an enqueue.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct EnqFlags: u64 {
        const WAKEUP = 1 << 0;
        /// The task is the only runnable one left on this CPU.
        const LAST = 1 << 1;
    }
}

/// Parameters for admitting a task.
#[derive(Clone, Copy, Debug)]
pub struct TaskInit {
    pub pid: Pid,
    pub affinity: CpuMask,
    pub weight: u32,
    pub kthread: bool,
    /// Whether the task asked for this policy. Only consulted with
    /// `switch_partial`.
    pub ext_policy: bool,
}

impl TaskInit {
    pub fn new(pid: Pid, affinity: CpuMask) -> Self {
        Self {
            pid,
            affinity,
            weight: DEFAULT_WEIGHT,
            kthread: false,
            ext_policy: true,
        }
    }
}

/// Result of admitting a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Managed, placed in the given domain.
    Managed(DomId),
    /// Left to the host's default class.
    Bypassed,
}

/// Where an enqueue placed the task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enqueued {
    /// Dispatched straight to the calling CPU.
    Local,
    /// Queued on a domain. `migrated` is set when a directive moved it.
    Queued { dom: DomId, migrated: bool },
}

/// What a dispatch call produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatched {
    /// Taken from the CPU's own domain.
    Local(Pid),
    /// Stolen from a backlogged foreign domain.
    Greedy { pid: Pid, from: DomId },
    Idle,
}

impl Dispatched {
    pub fn pid(&self) -> Option<Pid> {
        match *self {
            Dispatched::Local(pid) | Dispatched::Greedy { pid, .. } => Some(pid),
            Dispatched::Idle => None,
        }
    }
}

/// `a` is earlier than `b` on the wrapping vtime axis.
#[inline]
pub fn vtime_before(a: u64, b: u64) -> bool {
    (a.wrapping_sub(b) as i64) < 0
}
