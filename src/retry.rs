//! Retry policy for source calls

use crate::error::Result;
use std::time::Duration;

/// Retries with exponential backoff: `retry_delay`, then twice that, and so on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// A single attempt, no retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.retry_delay.saturating_mul(factor)
    }

    /// Run `op` until it succeeds or retries are exhausted.
    ///
    /// Returns the final result and the number of attempts made.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> (Result<T>, u32)
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match op() {
                Ok(value) => return (Ok(value), attempts),
                Err(e) if attempts <= self.max_retries => {
                    let delay = self.delay_for(attempts);
                    log::warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what,
                        attempts,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
                Err(e) => return (Err(e), attempts),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}
