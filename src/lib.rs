//! NexaOS Domain Scheduler
//!
//! A multi-domain CPU scheduling engine. CPUs are partitioned into domains,
//! each with one dispatch queue and one virtual-time clock. The host
//! scheduler core drives the engine through callbacks (select CPU, enqueue,
//! dispatch, running/stopping, affinity/weight changes, task lifecycle) and
//! an out-of-band load-balancing agent reads statistics and per-domain load
//! and writes rebalance directives back.
//!
//! ## Module Organization
//!
//! - `logger`: level-filtered kernel-style logging forwarded to `log`
//! - `error`: scheduler error type and errno mapping
//! - `config`: engine configuration and boot-style option parsing
//! - `ravg`: decayed running-average accumulators
//! - `sched`: the engine proper

#![no_std]

extern crate alloc;

pub mod config;
pub mod error;
pub mod logger;
pub mod ravg;
pub mod sched;

pub use config::SchedConfig;
pub use error::SchedError;
pub use sched::{DomainScheduler, SchedHost};

#[macro_export]
macro_rules! klog {
    ($level:expr, $($arg:tt)*) => {{
        $crate::logger::log($level, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! kfatal {
    ($($arg:tt)*) => {{
        $crate::klog!($crate::logger::LogLevel::FATAL, $($arg)*);
    }};
}

#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => {{
        $crate::klog!($crate::logger::LogLevel::ERROR, $($arg)*);
    }};
}

#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => {{
        $crate::klog!($crate::logger::LogLevel::WARN, $($arg)*);
    }};
}

#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => {{
        $crate::klog!($crate::logger::LogLevel::INFO, $($arg)*);
    }};
}

#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {{
        $crate::klog!($crate::logger::LogLevel::DEBUG, $($arg)*);
    }};
}

/// Hot-path tracing, compiled out unless `debug_verbose` is enabled.
#[cfg(feature = "debug_verbose")]
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {{
        $crate::klog!($crate::logger::LogLevel::TRACE, $($arg)*);
    }};
}

#[cfg(not(feature = "debug_verbose"))]
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {{}};
}
