// src/metrics/collector.rs
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Everything registered so far, in the Prometheus text format.
    pub fn gather(&self) -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!(error = %e, "Failed to encode metrics");
        }
        buffer
    }
}

pub struct MetricsCollector {
    // Attempt metrics
    pub attempts_total: IntCounterVec,
    pub attempt_duration_seconds: HistogramVec,
    pub intercepted_total: IntCounterVec,

    // Requests that never reached an attempt
    pub failures_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let attempts_total = IntCounterVec::new(
            Opts::new("proxy_attempts_total", "Attempts made against endpoints"),
            &["location", "endpoint", "outcome"],
        )?;
        registry.register(Box::new(attempts_total.clone()))?;

        let attempt_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "proxy_attempt_duration_seconds",
                "Attempt duration in seconds",
            ),
            &["location", "endpoint"],
        )?;
        registry.register(Box::new(attempt_duration_seconds.clone()))?;

        let intercepted_total = IntCounterVec::new(
            Opts::new(
                "proxy_intercepted_total",
                "Attempts answered by a middleware without reaching a backend",
            ),
            &["location"],
        )?;
        registry.register(Box::new(intercepted_total.clone()))?;

        let failures_total = IntCounterVec::new(
            Opts::new(
                "proxy_failures_total",
                "Requests that failed before any attempt was made",
            ),
            &["location", "reason"],
        )?;
        registry.register(Box::new(failures_total.clone()))?;

        Ok(Self {
            attempts_total,
            attempt_duration_seconds,
            intercepted_total,
            failures_total,
        })
    }

    pub fn record_attempt(&self, location: &str, endpoint: &str, outcome: &str, duration: Duration) {
        self.attempts_total
            .with_label_values(&[location, endpoint, outcome])
            .inc();

        self.attempt_duration_seconds
            .with_label_values(&[location, endpoint])
            .observe(duration.as_secs_f64());
    }

    pub fn record_intercepted(&self, location: &str) {
        self.intercepted_total.with_label_values(&[location]).inc();
    }

    pub fn record_failure(&self, location: &str, reason: &str) {
        self.failures_total
            .with_label_values(&[location, reason])
            .inc();
    }
}
