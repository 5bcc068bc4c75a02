//! Retry logic shared by every outbound call
//!
//! Provides exponential backoff with jitter. A `Retry-After` delay sent by
//! the server replaces the computed one.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::error::PipelineError;

/// Upper bound on a server-requested `Retry-After` delay
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Base delay between retries (doubles each attempt)
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    /// Relative jitter applied to computed delays, `0.25` is ±25 %
    pub jitter: f64,
}

impl Default for RetryPolicy {
    /// Default policy: 4 retries with delays of 2s, 4s, 8s, 16s (±25 %), capped at 60s
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with the default jitter
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            ..Self::default()
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }

    /// Total number of attempts, the first one included
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Calculate delay for given attempt (1-indexed), before jitter
    ///
    /// Uses exponential backoff: base_delay * 2^(attempt-1), capped at max_delay
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.base_delay.saturating_mul(multiplier);
        std::cmp::min(delay, self.max_delay)
    }

    /// Check if another attempt may follow the given one (1-indexed)
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// Delay to wait after `attempt` failed with `error`
    pub fn backoff(&self, attempt: u32, error: &PipelineError) -> Duration {
        match error.retry_after() {
            Some(requested) => std::cmp::min(requested, MAX_RETRY_AFTER),
            None => self.jittered(self.delay_for_attempt(attempt)),
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        std::cmp::min(delay.mul_f64(factor.max(0.0)), self.max_delay)
    }
}

/// Parse a `Retry-After` header value: delta-seconds or an HTTP-date
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = date.with_timezone(&Utc) - now;
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}

/// Execute an async operation with retry logic
///
/// # Arguments
///
/// * `policy` - Retry policy to use
/// * `operation_name` - Label used in log records
/// * `operation` - Async operation to execute
///
/// # Returns
///
/// Result of the operation, or the last error if it was permanent or all
/// retries failed
pub async fn execute_with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if e.is_retryable() && policy.should_retry(attempt) {
                    let delay = policy.backoff(attempt, &e);

                    tracing::warn!(
                        attempt = attempt,
                        max_attempts = policy.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        operation = operation_name,
                        "Retrying after error"
                    );

                    tokio::time::sleep(delay).await;
                } else {
                    if !e.is_retryable() {
                        tracing::debug!(
                            error = %e,
                            operation = operation_name,
                            "Error is not retryable, failing immediately"
                        );
                    } else {
                        tracing::warn!(
                            attempt = attempt,
                            max_attempts = policy.max_attempts(),
                            error = %e,
                            operation = operation_name,
                            "Max retries exceeded"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}
