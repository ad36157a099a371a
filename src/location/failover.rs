// src/location/failover.rs

use super::attempt::{Attempt, AttemptOutcome};
use crate::config::FailoverConfig;
use hyper::{Method, StatusCode};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

/// Decides whether a failed attempt is worth repeating on another endpoint.
#[derive(Debug, Clone, Default)]
pub struct FailoverPolicy {
    config: FailoverConfig,
}

impl FailoverPolicy {
    pub fn new(config: FailoverConfig) -> Self {
        Self { config }
    }

    /// Attempts allowed for one request: the configured maximum, or one
    /// per endpoint in the pool.
    pub fn budget(&self, endpoint_count: usize) -> u32 {
        self.config
            .max_attempts
            .unwrap_or_else(|| u32::try_from(endpoint_count).unwrap_or(u32::MAX))
            .max(1)
    }

    pub fn should_retry(
        &self,
        method: &Method,
        attempt: &Attempt,
        attempt_no: u32,
        budget: u32,
    ) -> RetryDecision {
        if attempt_no >= budget || attempt.is_intercepted() {
            return RetryDecision::NoRetry;
        }

        let retryable = match attempt.outcome() {
            AttemptOutcome::Error(err) => err.is_retryable(method),
            AttemptOutcome::Response(response) => self.is_retryable_status(response.status()),
        };

        if retryable {
            RetryDecision::Retry
        } else {
            RetryDecision::NoRetry
        }
    }

    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.config.retryable_statuses.contains(&status.as_u16())
    }

    /// Delay before the next attempt: exponential with jitter, `None` when disabled.
    pub fn backoff(&self, attempt_no: u32) -> Option<Duration> {
        let base = self.config.backoff_base_ms;
        if base == 0 || attempt_no == 0 {
            return None;
        }

        // Exponential backoff: base * 2^(attempt - 1)
        let exponential = base.saturating_mul(2u64.saturating_pow(attempt_no - 1));

        // Cap at maximum
        let capped = exponential.min(self.config.backoff_max_ms.max(base));

        // Add jitter (0-25% of the calculated backoff)
        let jitter = (capped as f64 * rand::random::<f64>() * 0.25) as u64;

        Some(Duration::from_millis(capped + jitter))
    }
}
