//! Static CPU-to-domain partition
//!
//! Built once before the engine starts and immutable afterwards. Every CPU
//! belongs to exactly one domain and every domain owns at least one CPU.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::SchedError;

use super::types::{CpuId, CpuMask, DomId, MAX_CPUS, MAX_DOMS};

#[derive(Clone, Debug)]
pub struct Topology {
    cpu_dom: Vec<DomId>,
    dom_cpus: Vec<CpuMask>,
}

impl Topology {
    /// Build from an explicit CPU map and per-domain masks, checking that
    /// both describe the same partition.
    pub fn new(cpu_dom: Vec<DomId>, dom_cpus: Vec<CpuMask>) -> Result<Self, SchedError> {
        if cpu_dom.is_empty() {
            return Err(SchedError::InvalidTopology("no cpus"));
        }
        if cpu_dom.len() > MAX_CPUS {
            return Err(SchedError::InvalidTopology("too many cpus"));
        }
        if dom_cpus.is_empty() {
            return Err(SchedError::InvalidTopology("no domains"));
        }
        if dom_cpus.len() > MAX_DOMS {
            return Err(SchedError::InvalidTopology("too many domains"));
        }

        for (cpu, &dom) in cpu_dom.iter().enumerate() {
            let Some(mask) = dom_cpus.get(dom as usize) else {
                return Err(SchedError::InvalidTopology("cpu mapped to unknown domain"));
            };
            if !mask.is_set(cpu as CpuId) {
                return Err(SchedError::InvalidTopology("cpu missing from its domain mask"));
            }
        }

        let nr_cpus = cpu_dom.len();
        let mut seen = CpuMask::empty();
        for mask in dom_cpus.iter() {
            if mask.is_empty() {
                return Err(SchedError::InvalidTopology("empty domain"));
            }
            if mask.iter_set().any(|cpu| cpu as usize >= nr_cpus) {
                return Err(SchedError::InvalidTopology("domain names a cpu outside the map"));
            }
            if seen.intersects(mask) {
                return Err(SchedError::InvalidTopology("cpu in more than one domain"));
            }
            seen = seen.or(mask);
        }

        Ok(Self { cpu_dom, dom_cpus })
    }

    /// Build from a CPU-to-domain map, deriving the domain masks.
    pub fn from_cpu_dom_map(cpu_dom: &[DomId]) -> Result<Self, SchedError> {
        let nr_doms = cpu_dom.iter().copied().max().map_or(0, |d| d as usize + 1);
        if nr_doms > MAX_DOMS {
            return Err(SchedError::InvalidTopology("too many domains"));
        }

        let mut dom_cpus = vec![CpuMask::empty(); nr_doms];
        for (cpu, &dom) in cpu_dom.iter().enumerate() {
            dom_cpus[dom as usize].set(cpu as CpuId);
        }

        Self::new(cpu_dom.to_vec(), dom_cpus)
    }

    /// `nr_doms` domains of contiguous CPUs. The last domain takes the
    /// remainder when the split is uneven.
    pub fn uniform(nr_cpus: usize, nr_doms: usize) -> Result<Self, SchedError> {
        if nr_doms == 0 || nr_doms > nr_cpus {
            return Err(SchedError::InvalidTopology("domain count out of range"));
        }
        let per_dom = nr_cpus / nr_doms;
        let cpu_dom: Vec<DomId> = (0..nr_cpus)
            .map(|cpu| (cpu / per_dom).min(nr_doms - 1) as DomId)
            .collect();
        Self::from_cpu_dom_map(&cpu_dom)
    }

    pub fn nr_cpus(&self) -> usize {
        self.cpu_dom.len()
    }

    pub fn nr_doms(&self) -> usize {
        self.dom_cpus.len()
    }

    pub fn cpu_to_dom(&self, cpu: CpuId) -> Option<DomId> {
        self.cpu_dom.get(cpu as usize).copied()
    }

    pub fn dom_cpus(&self, dom: DomId) -> Option<&CpuMask> {
        self.dom_cpus.get(dom as usize)
    }

    /// `(domain, cpus)` pairs in id order.
    pub fn doms(&self) -> impl Iterator<Item = (DomId, &CpuMask)> + '_ {
        self.dom_cpus
            .iter()
            .enumerate()
            .map(|(dom, cpus)| (dom as DomId, cpus))
    }

    /// Bitmap of domains whose CPUs intersect `affinity`.
    pub fn dom_mask_for(&self, affinity: &CpuMask) -> u64 {
        self.dom_cpus
            .iter()
            .enumerate()
            .filter(|(_, cpus)| cpus.intersects(affinity))
            .fold(0u64, |acc, (dom, _)| acc | (1 << dom))
    }
}
