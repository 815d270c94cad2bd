//! # Start policy consumed by restart loops.
//!
//! [`StartPolicy`] is the configuration contract between a record and whatever
//! supervises it: how long to wait before a (re)start and how many restarts a failing
//! child may consume. The record only stores these values; deciding when to relaunch
//! (and cloning the record to do it) belongs to the caller.
//!
//! ```text
//! loop {
//!   policy = child.start_policy()
//!   sleep(policy.delay)
//!   child.start(); status = child.wait()
//!   if succeeded || !policy.allows_retry(restarts) { break }
//!   restarts += 1; child = child.clone_child()
//! }
//! ```

use std::time::Duration;

/// Delay and retry settings read together from one record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StartPolicy {
    /// Wait before a (re)start attempt.
    pub delay: Duration,
    /// Maximum number of restarts after failure.
    pub retries: u32,
}

impl StartPolicy {
    /// Creates a policy from a delay in milliseconds and a retry count.
    pub fn new(delay_ms: u64, retries: u32) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            retries,
        }
    }

    /// Returns `true` if another restart is allowed after `restarts_done` restarts.
    #[inline]
    pub fn allows_retry(&self, restarts_done: u32) -> bool {
        restarts_done < self.retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_retry_counts_restarts() {
        let p = StartPolicy::new(25, 3);
        assert_eq!(p.delay, Duration::from_millis(25));
        assert!(p.allows_retry(0));
        assert!(p.allows_retry(2));
        assert!(!p.allows_retry(3));
    }

    #[test]
    fn test_zero_retries_never_restarts() {
        assert!(!StartPolicy::new(0, 0).allows_retry(0));
    }
}
