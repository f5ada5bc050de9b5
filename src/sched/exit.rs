//! Exit reporting
//!
//! Records why the policy stopped. The first exit wins; later ones are
//! logged and dropped.

use alloc::string::String;
use core::sync::atomic::{AtomicBool, Ordering};
use spin::Mutex;

/// Longest exit message kept, in bytes.
pub const EXIT_MSG_LEN: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitKind {
    None,
    Done,
    Unregistered,
    SysRq,
    Error,
    ErrorStall,
}

impl ExitKind {
    /// Numeric code, compatible with sched_ext exit kinds.
    pub const fn code(self) -> i64 {
        match self {
            ExitKind::None => 0,
            ExitKind::Done => 1,
            ExitKind::Unregistered => 64,
            ExitKind::SysRq => 65,
            ExitKind::Error => 1024,
            ExitKind::ErrorStall => 1026,
        }
    }

    pub const fn reason(self) -> &'static str {
        match self {
            ExitKind::None => "none",
            ExitKind::Done => "policy done",
            ExitKind::Unregistered => "scheduler unregistered",
            ExitKind::SysRq => "disabled by sysrq",
            ExitKind::Error => "runtime error",
            ExitKind::ErrorStall => "runnable task stall",
        }
    }

    pub const fn is_error(self) -> bool {
        matches!(self, ExitKind::Error | ExitKind::ErrorStall)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExitInfo {
    pub kind: ExitKind,
    pub msg: String,
}

impl ExitInfo {
    pub fn new(kind: ExitKind, msg: &str) -> Self {
        let mut end = msg.len().min(EXIT_MSG_LEN);
        while !msg.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            kind,
            msg: String::from(&msg[..end]),
        }
    }
}

pub struct ExitRecord {
    exited: AtomicBool,
    info: Mutex<Option<ExitInfo>>,
}

impl ExitRecord {
    pub const fn new() -> Self {
        Self {
            exited: AtomicBool::new(false),
            info: Mutex::new(None),
        }
    }

    #[inline]
    pub fn exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    /// Record an exit. Returns false if one was already recorded.
    pub fn record(&self, kind: ExitKind, msg: &str) -> bool {
        if self
            .exited
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        *self.info.lock() = Some(ExitInfo::new(kind, msg));
        true
    }

    pub fn info(&self) -> Option<ExitInfo> {
        self.info.lock().clone()
    }
}

impl Default for ExitRecord {
    fn default() -> Self {
        Self::new()
    }
}
