//! Retry with exponential backoff for classifier calls.
//!
//! The classifier is an external service; a failed call is retried after
//! an increasing delay until the attempt budget runs out. Sleeping blocks
//! the calling thread only.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// Attempt budget and backoff shape. Delays are (de)serialized as
/// milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one. Must be at least 1.
    pub max_attempts: u32,
    /// Delay after the first failure; doubled after each further failure.
    #[serde(with = "crate::serde_millis")]
    pub base_delay: Duration,
    /// Upper bound for a single delay, before jitter.
    #[serde(with = "crate::serde_millis")]
    pub max_delay: Duration,
    /// Add 0-50% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if self.max_attempts == 0 {
            return Err(PlanError::InvalidConfig(
                "max_attempts must be at least 1".into(),
            ));
        }
        if self.base_delay > self.max_delay {
            return Err(PlanError::InvalidConfig(
                "base_delay must not exceed max_delay".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of [`execute_with_retry`].
#[derive(Debug, Clone)]
pub struct RetryResult<T> {
    pub result: Result<T, String>,
    /// Attempts made (1 = first call succeeded).
    pub attempts: u32,
    pub total_duration: Duration,
}

impl<T> RetryResult<T> {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    /// Terminal failures become [`PlanError::ClassifierExhausted`].
    pub fn into_result(self) -> Result<T, PlanError> {
        let attempts = self.attempts;
        self.result
            .map_err(|last_error| PlanError::ClassifierExhausted {
                attempts,
                last_error,
            })
    }
}

/// Run `operation` until it succeeds or `config.max_attempts` calls have
/// failed. The closure receives the zero-based attempt number.
pub fn execute_with_retry<T, F>(config: &RetryConfig, mut operation: F) -> RetryResult<T>
where
    F: FnMut(u32) -> Result<T, String>,
{
    let start = Instant::now();
    let attempts = config.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        match operation(attempt) {
            Ok(value) => {
                return RetryResult {
                    result: Ok(value),
                    attempts: attempt + 1,
                    total_duration: start.elapsed(),
                };
            }
            Err(error) => {
                tracing::warn!(attempt = attempt + 1, error = %error, "retry_attempt_failed");
                last_error = Some(error);
                if attempt + 1 < attempts {
                    std::thread::sleep(calculate_delay(config, attempt));
                }
            }
        }
    }

    RetryResult {
        result: Err(last_error.unwrap_or_else(|| "all attempts failed".to_string())),
        attempts,
        total_duration: start.elapsed(),
    }
}

/// Delay after failed attempt `attempt` (zero-based).
fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let base = config.base_delay.as_millis() as u64;
    let exponential = base.saturating_mul(2_u64.saturating_pow(attempt));
    let delay = exponential.min(config.max_delay.as_millis() as u64);

    if config.jitter && delay > 0 {
        let jitter = fastrand::u64(0..=delay / 2);
        Duration::from_millis(delay + jitter)
    } else {
        Duration::from_millis(delay)
    }
}
