//! # Default settings for child process records.
//!
//! Provides [`Config`] centralized defaults used when a record is constructed.
//!
//! Config is used in two ways:
//! 1. **Record creation**: `ChildProcess::builder(name).config(cfg).build()`
//! 2. **Handle creation**: launchers read `output`, `output_capacity` and `stop_grace`
//!
//! ## Sentinel values
//! - `stop_grace = 0s` → `stop()` kills immediately without a polite signal first
//! - `output_capacity = 0` → clamped to 1

use std::time::Duration;

use crate::process::OutputMode;

/// Defaults for new records and their process handles.
///
/// ## Field semantics
/// - `id_length`: Length of generated record ids
/// - `delay_start`: Initial delay-before-start, in milliseconds
/// - `retry_times`: Initial maximum number of restart attempts
/// - `output`: How the handle captures stdout/stderr
/// - `output_capacity`: Ring size of the streamed output channel (min 1)
/// - `stop_grace`: Wait between SIGTERM and SIGKILL on `stop()` (`0s` = kill at once)
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of characters in a generated record id.
    pub id_length: usize,

    /// Milliseconds an external restart loop waits before (re)starting.
    pub delay_start: u64,

    /// Maximum number of restart attempts after a failure.
    pub retry_times: u32,

    /// Output capture mode for the owned process handle.
    pub output: OutputMode,

    /// Capacity of the broadcast channel carrying streamed output lines.
    ///
    /// Slow readers lagging more than `output_capacity` lines observe `Lagged`
    /// and skip the oldest lines.
    pub output_capacity: usize,

    /// Grace period given to the child between SIGTERM and SIGKILL.
    pub stop_grace: Duration,
}

impl Config {
    /// Returns the output channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn output_capacity_clamped(&self) -> usize {
        self.output_capacity.max(1)
    }

    /// Returns the stop grace period as an `Option`.
    ///
    /// - `None` → kill immediately
    /// - `Some(d)` → terminate politely, then kill after `d`
    #[inline]
    pub fn grace_period(&self) -> Option<Duration> {
        if self.stop_grace == Duration::ZERO {
            None
        } else {
            Some(self.stop_grace)
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `id_length = 16`
    /// - `delay_start = 25` (ms)
    /// - `retry_times = 3`
    /// - `output = OutputMode::streaming()` (unbuffered, line streaming)
    /// - `output_capacity = 1024`
    /// - `stop_grace = 5s`
    fn default() -> Self {
        Self {
            id_length: 16,
            delay_start: 25,
            retry_times: 3,
            output: OutputMode::streaming(),
            output_capacity: 1024,
            stop_grace: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.id_length, 16);
        assert_eq!(cfg.delay_start, 25);
        assert_eq!(cfg.retry_times, 3);
        assert!(cfg.output.streaming);
        assert!(!cfg.output.buffered);
    }

    #[test]
    fn test_sentinels() {
        let cfg = Config {
            output_capacity: 0,
            stop_grace: Duration::ZERO,
            ..Config::default()
        };
        assert_eq!(cfg.output_capacity_clamped(), 1);
        assert_eq!(cfg.grace_period(), None);
    }
}
