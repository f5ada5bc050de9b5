//! Engine configuration
//!
//! Everything here is read once when the engine is built and never changes
//! afterwards. Options can be supplied programmatically or parsed from a
//! boot-style command line (`dsched.fifo dsched.greedy=8 ...`).

use crate::error::SchedError;

/// Default time slice (20ms).
pub const DEFAULT_SLICE_NS: u64 = 20_000_000;

/// Default queue depth a foreign domain must reach before idle CPUs steal.
pub const DEFAULT_GREEDY_THRESHOLD: u32 = 4;

/// Default ravg half-life (1s).
pub const DEFAULT_LOAD_HALF_LIFE_NS: u64 = 1_000_000_000;

/// Default capacity of the task table and of each domain queue.
pub const DEFAULT_MAX_TASKS: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedConfig {
    /// Pinned kernel threads are always dispatched to the local CPU.
    pub kthreads_local: bool,
    /// Domain queues are FIFO instead of vtime ordered.
    pub fifo_sched: bool,
    /// Only tasks that ask for this policy are managed.
    pub switch_partial: bool,
    /// Minimum foreign queue depth for greedy stealing, 0 disables it.
    pub greedy_threshold: u32,
    pub slice_ns: u64,
    pub load_half_life_ns: u64,
    pub max_tasks: usize,
}

impl SchedConfig {
    pub const fn new() -> Self {
        Self {
            kthreads_local: false,
            fifo_sched: false,
            switch_partial: false,
            greedy_threshold: DEFAULT_GREEDY_THRESHOLD,
            slice_ns: DEFAULT_SLICE_NS,
            load_half_life_ns: DEFAULT_LOAD_HALF_LIFE_NS,
            max_tasks: DEFAULT_MAX_TASKS,
        }
    }

    /// Defaults overridden by whatever `cmdline` sets.
    pub fn from_cmdline(cmdline: &str) -> Self {
        let mut config = Self::new();
        config.apply_cmdline(cmdline);
        config
    }

    pub fn validate(&self) -> Result<(), SchedError> {
        if self.slice_ns == 0 {
            return Err(SchedError::InvalidConfig("slice must be non-zero"));
        }
        if self.load_half_life_ns == 0 {
            return Err(SchedError::InvalidConfig("load half-life must be non-zero"));
        }
        if self.max_tasks == 0 {
            return Err(SchedError::InvalidConfig("task capacity must be non-zero"));
        }
        Ok(())
    }

    /// Apply `dsched.*` options from a boot-style command line.
    ///
    /// Returns the number of options applied. Unknown tokens are left for
    /// other consumers; malformed values are reported and skipped.
    pub fn apply_cmdline(&mut self, cmdline: &str) -> usize {
        let mut applied = 0;

        for arg in cmdline.split_whitespace() {
            let Some(opt) = arg.strip_prefix("dsched.") else {
                continue;
            };

            if opt == "fifo" {
                self.fifo_sched = true;
                crate::kinfo!("dsched config: fifo ordering");
            } else if opt == "partial" {
                self.switch_partial = true;
                crate::kinfo!("dsched config: partial switch");
            } else if opt == "kthreads_local" {
                self.kthreads_local = true;
                crate::kinfo!("dsched config: kthreads dispatched locally");
            } else if let Some(value) = opt.strip_prefix("greedy=") {
                let Some(v) = parse_num::<u32>(arg, value) else { continue };
                self.greedy_threshold = v;
                crate::kinfo!("dsched config: greedy threshold={}", v);
            } else if let Some(value) = opt.strip_prefix("slice_us=") {
                let Some(v) = parse_num::<u64>(arg, value) else { continue };
                self.slice_ns = v.saturating_mul(1_000);
                crate::kinfo!("dsched config: slice={}us", v);
            } else if let Some(value) = opt.strip_prefix("half_life_ms=") {
                let Some(v) = parse_num::<u64>(arg, value) else { continue };
                self.load_half_life_ns = v.saturating_mul(1_000_000);
                crate::kinfo!("dsched config: load half-life={}ms", v);
            } else if let Some(value) = opt.strip_prefix("max_tasks=") {
                let Some(v) = parse_num::<usize>(arg, value) else { continue };
                self.max_tasks = v;
                crate::kinfo!("dsched config: max tasks={}", v);
            } else if opt.starts_with("log=") {
                // Handled by logger::apply_cmdline.
                continue;
            } else {
                crate::kwarn!("dsched config: unknown option '{}'", arg);
                continue;
            }
            applied += 1;
        }

        applied
    }
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_num<T: core::str::FromStr>(arg: &str, value: &str) -> Option<T> {
    match value.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            crate::kwarn!("dsched config: ignoring malformed '{}'", arg);
            None
        }
    }
}
