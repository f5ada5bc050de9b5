//! Scheduler Type Tests
//!
//! Tests for CpuMask, vtime comparison and callback result types.

use crate::sched::{vtime_before, CpuMask, Dispatched, EnqFlags, WakeFlags, MAX_CPUS};

// ============================================================================
// CpuMask Tests
// ============================================================================

#[test]
fn test_cpumask_empty() {
    let mask = CpuMask::empty();
    assert!(mask.is_empty());
    assert_eq!(mask.count(), 0);
    assert_eq!(mask.first_set(), None);
    assert_eq!(mask.iter_set().count(), 0);
}

#[test]
fn test_cpumask_set_clear() {
    let mut mask = CpuMask::empty();
    mask.set(3);
    mask.set(64);
    mask.set(511);
    assert!(mask.is_set(3));
    assert!(mask.is_set(64));
    assert!(mask.is_set(511));
    assert_eq!(mask.count(), 3);

    mask.clear(64);
    assert!(!mask.is_set(64));
    assert_eq!(mask.count(), 2);
}

#[test]
fn test_cpumask_out_of_range_ignored() {
    let mut mask = CpuMask::empty();
    mask.set(MAX_CPUS as u32);
    mask.set(u32::MAX);
    assert!(mask.is_empty());
    assert!(!mask.is_set(MAX_CPUS as u32));
}

#[test]
fn test_cpumask_first_n() {
    let mask = CpuMask::first_n(70);
    assert_eq!(mask.count(), 70);
    assert!(mask.is_set(69));
    assert!(!mask.is_set(70));
}

#[test]
fn test_cpumask_iter_set_order() {
    let mask = CpuMask::from_cpus(&[130, 1, 64, 0]);
    let cpus: Vec<u32> = mask.iter_set().collect();
    assert_eq!(cpus, vec![0, 1, 64, 130]);
    assert_eq!(mask.first_set(), Some(0));
}

#[test]
fn test_cpumask_set_ops() {
    let a = CpuMask::from_cpus(&[0, 1, 2, 100]);
    let b = CpuMask::from_cpus(&[2, 3, 100]);

    assert_eq!(a.and(&b), CpuMask::from_cpus(&[2, 100]));
    assert_eq!(a.or(&b), CpuMask::from_cpus(&[0, 1, 2, 3, 100]));
    assert!(a.intersects(&b));
    assert!(!a.intersects(&CpuMask::from_cpus(&[5])));
    assert!(CpuMask::from_cpus(&[2]).is_subset_of(&a));
    assert!(!b.is_subset_of(&a));
    assert!(CpuMask::empty().is_subset_of(&a));
}

// ============================================================================
// vtime comparison
// ============================================================================

#[test]
fn test_vtime_before_plain() {
    assert!(vtime_before(1, 2));
    assert!(!vtime_before(2, 1));
    assert!(!vtime_before(5, 5));
}

#[test]
fn test_vtime_before_wraps() {
    let near_max = u64::MAX - 10;
    assert!(vtime_before(near_max, 5));
    assert!(!vtime_before(5, near_max));
}

// ============================================================================
// Flags and results
// ============================================================================

#[test]
fn test_flags() {
    let wake = WakeFlags::SYNC | WakeFlags::FORK;
    assert!(wake.contains(WakeFlags::SYNC));
    assert!(!WakeFlags::empty().contains(WakeFlags::SYNC));

    let enq = EnqFlags::WAKEUP;
    assert!(!enq.contains(EnqFlags::LAST));
}

#[test]
fn test_dispatched_pid() {
    assert_eq!(Dispatched::Local(7).pid(), Some(7));
    assert_eq!(Dispatched::Greedy { pid: 9, from: 1 }.pid(), Some(9));
    assert_eq!(Dispatched::Idle.pid(), None);
}
