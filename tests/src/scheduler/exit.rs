//! Exit Handling Tests
//!
//! Tests for exit kinds, message truncation and first-exit-wins recording.

use super::{admit, all_cpus, make_sched, test_config};
use crate::error::SchedError;
use crate::sched::exit::ExitRecord;
use crate::sched::{ExitInfo, ExitKind, WakeFlags, EXIT_MSG_LEN};

#[test]
fn test_exit_kind_codes() {
    assert_eq!(ExitKind::None.code(), 0);
    assert_eq!(ExitKind::Done.code(), 1);
    assert_eq!(ExitKind::Unregistered.code(), 64);
    assert_eq!(ExitKind::SysRq.code(), 65);
    assert_eq!(ExitKind::Error.code(), 1024);
    assert_eq!(ExitKind::ErrorStall.code(), 1026);

    assert!(ExitKind::Error.is_error());
    assert!(ExitKind::ErrorStall.is_error());
    assert!(!ExitKind::Unregistered.is_error());
}

#[test]
fn test_exit_message_truncated() {
    let long = "x".repeat(EXIT_MSG_LEN + 40);
    let info = ExitInfo::new(ExitKind::Error, &long);
    assert_eq!(info.msg.len(), EXIT_MSG_LEN);
}

#[test]
fn test_exit_message_truncated_on_char_boundary() {
    // 3-byte chars: 256 is not a boundary.
    let long = "\u{20ac}".repeat(100);
    let info = ExitInfo::new(ExitKind::Error, &long);
    assert_eq!(info.msg.len(), 255);
    assert!(info.msg.chars().all(|c| c == '\u{20ac}'));
}

#[test]
fn test_exit_record_first_wins() {
    let record = ExitRecord::new();
    assert!(!record.exited());
    assert!(record.info().is_none());

    assert!(record.record(ExitKind::Error, "first"));
    assert!(!record.record(ExitKind::Done, "second"));

    let info = record.info().unwrap();
    assert_eq!(info.kind, ExitKind::Error);
    assert_eq!(info.msg, "first");
}

#[test]
fn test_unregister() {
    let sched = make_sched(8, 2, test_config());
    assert!(sched.is_active());
    assert!(sched.exit_info().is_none());

    sched.unregister();
    assert!(!sched.is_active());
    let info = sched.exit_info().unwrap();
    assert_eq!(info.kind, ExitKind::Unregistered);
    assert!(info.msg.is_empty());
}

#[test]
fn test_error_exit_carries_cause() {
    let sched = make_sched(8, 2, test_config());
    let _ = sched.select_cpu(0, 42, 0, WakeFlags::empty());

    let info = sched.exit_info().unwrap();
    assert_eq!(info.kind, ExitKind::Error);
    assert!(info.msg.contains("select_cpu"), "msg: {}", info.msg);
    assert!(info.msg.contains("42"), "msg: {}", info.msg);
}

#[test]
fn test_later_exit_does_not_override() {
    let sched = make_sched(8, 2, test_config());
    sched.exit(ExitKind::SysRq, "operator request");
    sched.exit(ExitKind::Error, "late failure");
    sched.unregister();

    let info = sched.exit_info().unwrap();
    assert_eq!(info.kind, ExitKind::SysRq);
    assert_eq!(info.msg, "operator request");
}

#[test]
fn test_callbacks_refused_after_exit() {
    let sched = make_sched(8, 2, test_config());
    admit(&sched, 0, 1, all_cpus(&sched));
    sched.exit(ExitKind::Done, "");

    assert_eq!(sched.select_cpu(0, 1, 0, WakeFlags::empty()), Err(SchedError::Exited));
    assert_eq!(sched.running(0, 1), Err(SchedError::Exited));
    assert_eq!(sched.stopping(0, 1, 0), Err(SchedError::Exited));
    assert_eq!(sched.quiescent(0, 1), Err(SchedError::Exited));
    assert_eq!(sched.set_cpumask(0, 1, &all_cpus(&sched)), Err(SchedError::Exited));
    assert_eq!(sched.dispatch(0), Err(SchedError::Exited));
    // Refusals are not new failures.
    assert_eq!(sched.exit_info().unwrap().kind, ExitKind::Done);
}
