// src/middleware/circuit_breaker.rs

use super::traits::{Intercept, Middleware};
use crate::config::CircuitBreakerConfig;
use crate::errors::ProxyError;
use crate::location::Attempt;
use crate::request::ProxyRequest;
use hyper::StatusCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,     // Normal operation
    Open,       // Failing, rejecting requests
    HalfOpen,   // Testing if the location recovered
}

struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
}

/// Stops sending traffic to a location whose backends keep failing.
///
/// Transport errors and 5xx responses count as failures. Once
/// `failure_threshold` of them happen in a row the breaker opens and every
/// request is answered with 503 until `timeout` has passed; then a trial
/// period starts and `success_threshold` successes close it again.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
            }),
            total_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn call_permitted(&self) -> bool {
        let mut state = self.lock();

        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let expired = state
                    .last_failure_time
                    .map(|t| t.elapsed() >= self.config.timeout())
                    .unwrap_or(true);
                if expired {
                    Self::transition_to_half_open(&mut state);
                }
                expired
            }
        }
    }

    pub fn record_success(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let mut state = self.lock();

        match state.state {
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.config.success_threshold {
                    Self::transition_to_closed(&mut state);
                }
            }
            CircuitState::Open => {
                // Stragglers admitted before the breaker opened; only the
                // half-open trial may close it.
            }
        }
    }

    pub fn record_failure(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
        let mut state = self.lock();

        match state.state {
            CircuitState::Closed => {
                state.failure_count += 1;
                if state.failure_count >= self.config.failure_threshold {
                    Self::transition_to_open(&mut state);
                }
            }
            CircuitState::HalfOpen => {
                Self::transition_to_open(&mut state);
            }
            CircuitState::Open => {
                state.last_failure_time = Some(Instant::now());
            }
        }
    }

    fn transition_to_open(state: &mut BreakerState) {
        state.state = CircuitState::Open;
        state.last_failure_time = Some(Instant::now());
        state.success_count = 0;

        tracing::warn!("Circuit breaker opened after {} failures", state.failure_count);
    }

    fn transition_to_half_open(state: &mut BreakerState) {
        state.state = CircuitState::HalfOpen;
        state.failure_count = 0;
        state.success_count = 0;

        tracing::info!("Circuit breaker transitioned to half-open");
    }

    fn transition_to_closed(state: &mut BreakerState) {
        state.state = CircuitState::Closed;
        state.failure_count = 0;
        state.success_count = 0;
        state.last_failure_time = None;

        tracing::info!("Circuit breaker closed after successful recovery");
    }

    pub fn get_state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn get_metrics(&self) -> CircuitBreakerMetrics {
        let state = self.lock();
        CircuitBreakerMetrics {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            failure_count: state.failure_count,
            success_count: state.success_count,
        }
    }
}

impl Middleware for CircuitBreaker {
    fn on_request(&self, req: &mut ProxyRequest) -> Intercept {
        if self.call_permitted() {
            Ok(None)
        } else {
            tracing::debug!(request_id = req.id(), "Circuit open, rejecting request");
            Err(ProxyError::from_status(StatusCode::SERVICE_UNAVAILABLE))
        }
    }

    fn on_response(&self, _req: &mut ProxyRequest, attempt: &Attempt) {
        if attempt.is_intercepted() {
            return;
        }

        let failed = attempt.error().map(|e| e.is_transport()).unwrap_or(false)
            || attempt.status().map(|s| s.is_server_error()).unwrap_or(false);
        if failed {
            self.record_failure();
        } else {
            self.record_success();
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreakerMetrics {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub failure_count: u32,
    pub success_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(timeout_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 2,
            timeout_ms,
        })
    }

    #[test]
    fn opens_after_consecutive_failures() {
        let cb = breaker(60_000);
        cb.record_failure();
        assert_eq!(cb.get_state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.get_state(), CircuitState::Open);
        assert!(!cb.call_permitted());
    }

    #[test]
    fn success_resets_failure_count() {
        let cb = breaker(60_000);
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        assert_eq!(cb.get_state(), CircuitState::Closed);
        assert_eq!(cb.get_metrics().failed_requests, 2);
    }

    #[test]
    fn recovers_through_half_open() {
        let cb = breaker(0);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.get_state(), CircuitState::Open);

        assert!(cb.call_permitted());
        assert_eq!(cb.get_state(), CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.get_state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.get_state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let cb = breaker(0);
        cb.record_failure();
        cb.record_failure();
        assert!(cb.call_permitted());
        cb.record_failure();
        assert_eq!(cb.get_state(), CircuitState::Open);
    }

    #[test]
    fn success_while_open_keeps_circuit_open() {
        let cb = breaker(60_000);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.get_state(), CircuitState::Open);

        cb.record_success();
        assert_eq!(cb.get_state(), CircuitState::Open);
        assert!(!cb.call_permitted());
        assert_eq!(cb.get_metrics().total_requests, 3);
    }
}
