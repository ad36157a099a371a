// src/metrics/observer.rs
use super::MetricsCollector;
use crate::errors::Error;
use crate::location::{Attempt, AttemptOutcome};
use crate::middleware::Observer;
use crate::request::ProxyRequest;
use std::sync::Arc;

/// Feeds every attempt of one location into the Prometheus collector.
pub struct MetricsObserver {
    location: String,
    collector: Arc<MetricsCollector>,
}

impl MetricsObserver {
    pub fn new(location: impl Into<String>, collector: Arc<MetricsCollector>) -> Self {
        Self {
            location: location.into(),
            collector,
        }
    }
}

impl Observer for MetricsObserver {
    fn on_request(&self, _req: &ProxyRequest) {}

    fn on_response(&self, _req: &ProxyRequest, attempt: &Attempt) {
        let endpoint = attempt.endpoint().id();

        if attempt.is_intercepted() {
            self.collector.record_intercepted(&self.location);
            return;
        }

        let outcome = match attempt.outcome() {
            AttemptOutcome::Response(response) => response.status().as_u16().to_string(),
            AttemptOutcome::Error(err) if err.is_transport() => "transport_error".to_string(),
            AttemptOutcome::Error(_) => "error".to_string(),
        };
        self.collector
            .record_attempt(&self.location, endpoint, &outcome, attempt.duration());
    }

    fn on_failure(&self, _req: &ProxyRequest, err: &Error) {
        let reason = match err {
            Error::NoAvailableEndpoints => "no_available_endpoints",
            _ => "error",
        };
        self.collector.record_failure(&self.location, reason);
    }
}
