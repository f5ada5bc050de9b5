//! Topology Tests
//!
//! Tests for building and validating the CPU-to-domain partition.

use crate::error::SchedError;
use crate::sched::{CpuMask, Topology, MAX_DOMS};

#[test]
fn test_uniform_even_split() {
    let topo = Topology::uniform(8, 2).unwrap();
    assert_eq!(topo.nr_cpus(), 8);
    assert_eq!(topo.nr_doms(), 2);
    assert_eq!(topo.dom_cpus(0), Some(&CpuMask::from_cpus(&[0, 1, 2, 3])));
    assert_eq!(topo.dom_cpus(1), Some(&CpuMask::from_cpus(&[4, 5, 6, 7])));
    assert_eq!(topo.cpu_to_dom(5), Some(1));
    assert_eq!(topo.cpu_to_dom(8), None);
}

#[test]
fn test_uniform_uneven_split_goes_to_last() {
    let topo = Topology::uniform(7, 3).unwrap();
    assert_eq!(topo.dom_cpus(0).unwrap().count(), 2);
    assert_eq!(topo.dom_cpus(1).unwrap().count(), 2);
    assert_eq!(topo.dom_cpus(2).unwrap().count(), 3);
    assert_eq!(topo.cpu_to_dom(6), Some(2));
}

#[test]
fn test_uniform_rejects_bad_counts() {
    assert!(Topology::uniform(4, 0).is_err());
    assert!(Topology::uniform(4, 5).is_err());
}

#[test]
fn test_from_map_interleaved() {
    let topo = Topology::from_cpu_dom_map(&[0, 1, 0, 1]).unwrap();
    assert_eq!(topo.dom_cpus(0), Some(&CpuMask::from_cpus(&[0, 2])));
    assert_eq!(topo.dom_cpus(1), Some(&CpuMask::from_cpus(&[1, 3])));
}

#[test]
fn test_from_map_rejects_gap_domain() {
    // Domain 1 has no CPUs.
    let err = Topology::from_cpu_dom_map(&[0, 2, 2]).unwrap_err();
    assert_eq!(err, SchedError::InvalidTopology("empty domain"));
}

#[test]
fn test_from_map_rejects_empty() {
    assert!(Topology::from_cpu_dom_map(&[]).is_err());
}

#[test]
fn test_new_rejects_inconsistent_masks() {
    let err = Topology::new(vec![0, 0], vec![CpuMask::from_cpus(&[0])]).unwrap_err();
    assert_eq!(err, SchedError::InvalidTopology("cpu missing from its domain mask"));

    let overlap = Topology::new(
        vec![0, 1],
        vec![CpuMask::from_cpus(&[0, 1]), CpuMask::from_cpus(&[1])],
    );
    assert!(overlap.is_err());

    let outside = Topology::new(vec![0], vec![CpuMask::from_cpus(&[0, 9])]);
    assert!(outside.is_err());
}

#[test]
fn test_too_many_domains() {
    let map: Vec<u32> = (0..=MAX_DOMS as u32).collect();
    assert!(Topology::from_cpu_dom_map(&map).is_err());
}

#[test]
fn test_dom_mask_for() {
    let topo = Topology::uniform(6, 3).unwrap();
    assert_eq!(topo.dom_mask_for(&CpuMask::from_cpus(&[0])), 0b001);
    assert_eq!(topo.dom_mask_for(&CpuMask::from_cpus(&[1, 4])), 0b101);
    assert_eq!(topo.dom_mask_for(&CpuMask::first_n(6)), 0b111);
    assert_eq!(topo.dom_mask_for(&CpuMask::from_cpus(&[40])), 0);
}
