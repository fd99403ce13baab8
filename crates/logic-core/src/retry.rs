use std::time::Duration;

use crate::error::DispatchError;

/// Capped exponential backoff used by callers that retry failed loads.
///
/// The dispatcher never retries on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base_delay_ms: u64,
    max_delay_ms: u64,
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
            max_attempts,
        }
    }

    pub fn base_delay_ms(&self) -> u64 {
        self.base_delay_ms
    }

    pub fn max_delay_ms(&self) -> u64 {
        self.max_delay_ms
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay before retry number `attempt` (0-based), or `None` once the
    /// attempt budget is spent.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then(|| {
            let doubled = self.base_delay_ms.saturating_mul(2_u64.saturating_pow(attempt));
            Duration::from_millis(doubled.min(self.max_delay_ms))
        })
    }

    /// Like [`Self::delay_for_attempt`], but only for errors worth repeating.
    pub fn delay_for(&self, error: &DispatchError, attempt: u32) -> Option<Duration> {
        if !error.is_retryable() {
            return None;
        }
        self.delay_for_attempt(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(250, 4_000, 3)
    }
}
