//! Bounded retry with exponential backoff + jitter for the attempt loop.
//!
//! Not exception-driven: each attempt produces a tagged outcome and the
//! loop lives in `fetcher.rs`; this module only computes delays.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Number of retries after the initial attempt — total attempts made
    /// is this plus one (attempt indices `0..=max_retries`).
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Delay before the given zero-indexed retry attempt, capped at
    /// `max_delay` and randomized by up to ±50% of the base delay when
    /// jitter is enabled.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_millis = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let capped = base_millis.min(self.max_delay.as_millis() as f64);

        let millis = if self.jitter {
            let jitter_span = capped * 0.5;
            let offset = (fastrand::f64() - 0.5) * 2.0 * jitter_span;
            (capped + offset).max(0.0)
        } else {
            capped
        };

        Duration::from_millis(millis as u64)
    }
}
