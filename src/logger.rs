//! Leveled logging
//!
//! A global level filter in front of the `log` facade. The level can be set
//! at runtime or from a `log=`/`loglevel=`/`dsched.log=` cmdline directive.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::INFO.priority());

/// Target used for records forwarded to the `log` facade.
pub const LOG_TARGET: &str = "domsched";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    PANIC,
    FATAL,
    ERROR,
    WARN,
    INFO,
    DEBUG,
    TRACE,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            LogLevel::PANIC => "PANIC",
            LogLevel::FATAL => "FATAL",
            LogLevel::ERROR => "ERROR",
            LogLevel::WARN => "WARN",
            LogLevel::INFO => "INFO",
            LogLevel::DEBUG => "DEBUG",
            LogLevel::TRACE => "TRACE",
        }
    }

    pub const fn priority(self) -> u8 {
        match self {
            LogLevel::PANIC => 0,
            LogLevel::FATAL => 1,
            LogLevel::ERROR => 2,
            LogLevel::WARN => 3,
            LogLevel::INFO => 4,
            LogLevel::DEBUG => 5,
            LogLevel::TRACE => 6,
        }
    }

    pub fn from_priority(value: u8) -> Self {
        match value {
            0 => LogLevel::PANIC,
            1 => LogLevel::FATAL,
            2 => LogLevel::ERROR,
            3 => LogLevel::WARN,
            4 => LogLevel::INFO,
            5 => LogLevel::DEBUG,
            _ => LogLevel::TRACE,
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("panic") {
            Some(LogLevel::PANIC)
        } else if value.eq_ignore_ascii_case("fatal") {
            Some(LogLevel::FATAL)
        } else if value.eq_ignore_ascii_case("error") {
            Some(LogLevel::ERROR)
        } else if value.eq_ignore_ascii_case("warn") || value.eq_ignore_ascii_case("warning") {
            Some(LogLevel::WARN)
        } else if value.eq_ignore_ascii_case("info") {
            Some(LogLevel::INFO)
        } else if value.eq_ignore_ascii_case("debug") {
            Some(LogLevel::DEBUG)
        } else if value.eq_ignore_ascii_case("trace") {
            Some(LogLevel::TRACE)
        } else {
            None
        }
    }

    /// Map onto the `log` facade. PANIC and FATAL have no counterpart and
    /// collapse into `Error`.
    pub const fn to_log_level(self) -> ::log::Level {
        match self {
            LogLevel::PANIC | LogLevel::FATAL | LogLevel::ERROR => ::log::Level::Error,
            LogLevel::WARN => ::log::Level::Warn,
            LogLevel::INFO => ::log::Level::Info,
            LogLevel::DEBUG => ::log::Level::Debug,
            LogLevel::TRACE => ::log::Level::Trace,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn log(level: LogLevel, args: fmt::Arguments<'_>) {
    if !enabled(level) {
        return;
    }

    ::log::log!(target: LOG_TARGET, level.to_log_level(), "[{:<5}] {}", level, args);
}

pub fn enabled(level: LogLevel) -> bool {
    level.priority() <= LOG_LEVEL.load(Ordering::Relaxed)
}

pub fn set_max_level(level: LogLevel) {
    LOG_LEVEL.store(level.priority(), Ordering::Relaxed);
}

pub fn max_level() -> LogLevel {
    LogLevel::from_priority(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Find a level directive (`log=`, `loglevel=` or `dsched.log=`) in a
/// boot-style command line. The first valid one wins.
pub fn parse_level_directive(cmdline: &str) -> Option<LogLevel> {
    for token in cmdline.split_whitespace() {
        if let Some((key, value)) = token.split_once('=') {
            if key.eq_ignore_ascii_case("log")
                || key.eq_ignore_ascii_case("loglevel")
                || key.eq_ignore_ascii_case("dsched.log")
            {
                if let Some(level) = LogLevel::from_str(value) {
                    return Some(level);
                }
            }
        }
    }
    None
}

/// Apply a level directive from `cmdline` if one is present.
pub fn apply_cmdline(cmdline: &str) -> Option<LogLevel> {
    let level = parse_level_directive(cmdline)?;
    set_max_level(level);
    Some(level)
}
