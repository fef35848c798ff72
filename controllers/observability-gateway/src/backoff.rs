//! # Fibonacci Backoff
//!
//! Retry delays for gateways whose passes keep failing. The delay grows
//! along the Fibonacci sequence, slower than exponential backoff, so a
//! gateway stuck on a validation error is retried for a while before
//! settling at the cap.
//!
//! Sequence with the defaults (1m min, 10m max): 1m, 1m, 2m, 3m, 5m, 8m, 10m, 10m, ...

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Works in whole minutes; each delay is the sum of the previous two,
/// capped at `max_minutes`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    prev_minutes: u64,
    current_minutes: u64,
    max_minutes: u64,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min_minutes` and capped at `max_minutes`.
    ///
    /// A `max_minutes` below `min_minutes` is raised to `min_minutes`.
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes: max_minutes.max(min_minutes),
        }
    }

    /// Returns the current delay and advances the sequence.
    pub fn next_backoff(&mut self) -> Duration {
        let delay = Duration::from_secs(self.current_minutes * 60);

        let next_minutes = self.prev_minutes.saturating_add(self.current_minutes);
        self.prev_minutes = self.current_minutes;
        self.current_minutes = next_minutes.min(self.max_minutes);

        delay
    }
}
