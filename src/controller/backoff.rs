//! # Fibonacci Backoff
//!
//! Provides a Fibonacci-based backoff for requeueing failed reconciliations.
//! It grows more slowly than exponential backoff, so a transient API fault is
//! retried quickly while a persistent one (a missing secret) settles at the cap.
//!
//! Sequence with the defaults: 5s, 5s, 10s, 15s, 25s, 40s, 65s, 105s, 170s,
//! 275s, 300s (max).
//!
//! ## Usage
//!
//! ```rust
//! use newca_controller::controller::backoff::FibonacciBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = FibonacciBackoff::new(Duration::from_secs(5), Duration::from_secs(300));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(5));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(5));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(10));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(15));
//! ```

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, capped at `max`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Minimum backoff (for reset)
    min: Duration,
    /// Previous backoff
    prev: Duration,
    /// Current backoff
    current: Duration,
    /// Maximum backoff
    max: Duration,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff
    ///
    /// A `max` below `min` is raised to `min`.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self {
            min,
            prev: Duration::ZERO,
            current: min,
            max,
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        let next = self.prev.saturating_add(self.current);
        self.prev = self.current;
        self.current = next.min(self.max);
        result
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev = Duration::ZERO;
        self.current = self.min;
    }
}
