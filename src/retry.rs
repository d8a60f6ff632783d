//! Bounded retry with optional exponential backoff.
//!
//! `retry_until` drives an async probe until it reports success or the
//! attempt budget runs out. It never sleeps after the final attempt, and an
//! exhausted budget is reported through `RetryOutcome` rather than an error so
//! callers decide whether running out matters.

use std::future::Future;
use std::time::Duration;

/// How often and how many times to retry.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    /// Interval multiplier after each failed attempt; 1.0 keeps it fixed
    pub backoff_factor: f64,
    pub max_interval: Duration,
}

impl RetryPolicy {
    /// Fixed interval between attempts.
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            initial_interval: interval,
            backoff_factor: 1.0,
            max_interval: interval,
        }
    }

    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff_factor = factor;
        self.max_interval = max_interval;
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let factor = self.backoff_factor.max(1.0).powi(exponent);
        let scaled = self.initial_interval.as_secs_f64() * factor;
        let capped = scaled.min(self.max_interval.as_secs_f64().max(self.initial_interval.as_secs_f64()));
        Duration::from_secs_f64(capped)
    }
}

/// Result of a bounded retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOutcome {
    pub succeeded: bool,
    /// Attempts actually made
    pub attempts: u32,
}

/// Call `probe` until it returns `true` or `policy.max_attempts` is reached.
/// The probe receives the 1-based attempt number.
pub async fn retry_until<F, Fut>(policy: &RetryPolicy, mut probe: F) -> RetryOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = bool>,
{
    let mut attempt = 0;
    while attempt < policy.max_attempts {
        attempt += 1;
        if probe(attempt).await {
            return RetryOutcome {
                succeeded: true,
                attempts: attempt,
            };
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.delay_after(attempt)).await;
        }
    }
    RetryOutcome {
        succeeded: false,
        attempts: attempt,
    }
}
