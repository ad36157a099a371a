// src/config/mod.rs
mod models;

pub use models::*;

use crate::load_balancer::{create_load_balancer, Endpoint};
use crate::location::{HttpLocation, LocationOptions};
use crate::metrics::{MetricsCollector, MetricsObserver};
use crate::middleware::{CircuitBreaker, RateLimiter};
use crate::route::PathRouter;
use anyhow::{bail, Context, Result};
use hyper::StatusCode;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Load configuration from a file (YAML or JSON)
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&contents).context("Failed to parse YAML config")?
        }
        _ => serde_json::from_str(&contents).context("Failed to parse JSON config")?,
    };

    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.locations.is_empty() {
            bail!("at least one location must be configured");
        }

        let mut names = HashSet::new();
        for location in &self.locations {
            if !names.insert(location.name.as_str()) {
                bail!("duplicate location name {:?}", location.name);
            }
            location
                .validate()
                .with_context(|| format!("invalid location {:?}", location.name))?;
        }
        Ok(())
    }
}

impl LocationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            bail!("no endpoints configured");
        }
        for endpoint in &self.endpoints {
            Endpoint::parse(endpoint)?;
        }

        if self.failover.max_attempts == Some(0) {
            bail!("failover.max_attempts must be at least 1");
        }
        for status in &self.failover.retryable_statuses {
            if StatusCode::from_u16(*status).is_err() {
                bail!("{} is not a valid HTTP status", status);
            }
        }

        if let Some(rate_limit) = &self.rate_limit {
            if !(rate_limit.requests_per_second > 0.0) || rate_limit.burst == 0 {
                bail!("rate_limit needs positive requests_per_second and burst");
            }
        }
        if let Some(breaker) = &self.circuit_breaker {
            if breaker.failure_threshold == 0 || breaker.success_threshold == 0 {
                bail!("circuit_breaker thresholds must be positive");
            }
        }
        Ok(())
    }

    pub fn options(&self) -> LocationOptions {
        let millis = |ms: u64| (ms > 0).then(|| Duration::from_millis(ms));
        LocationOptions {
            trust_forward_header: self.trust_forward_header,
            max_body_bytes: self.max_body_bytes,
            body_read_timeout: self.body_read_timeout_ms.and_then(millis),
            backend_timeout: millis(self.backend_timeout_ms),
            connect_timeout: millis(self.connect_timeout_ms),
            failover: self.failover.clone(),
        }
    }
}

/// Builds one location from its config, seeding the endpoint pool and
/// installing the configured middlewares.
pub fn build_location(
    config: &LocationConfig,
    metrics: Option<Arc<MetricsCollector>>,
) -> Result<HttpLocation> {
    let load_balancer = create_load_balancer(config.algorithm);
    for raw in &config.endpoints {
        load_balancer.add_endpoint(Endpoint::parse(raw)?)?;
    }

    let location = HttpLocation::with_options(&config.name, load_balancer, config.options());

    // Breaker first so an open circuit does not consume rate limit tokens.
    if let Some(breaker) = &config.circuit_breaker {
        location
            .middleware_chain()
            .append("circuit_breaker", Arc::new(CircuitBreaker::new(breaker.clone())))?;
    }
    if let Some(rate_limit) = &config.rate_limit {
        location
            .middleware_chain()
            .append("rate_limit", Arc::new(RateLimiter::new(rate_limit)))?;
    }
    if let Some(collector) = metrics {
        location
            .observer_chain()
            .append("metrics", Arc::new(MetricsObserver::new(&config.name, collector)))?;
    }

    Ok(location)
}

pub fn build_router(config: &Config, metrics: Option<Arc<MetricsCollector>>) -> Result<PathRouter> {
    let mut router = PathRouter::new();
    for location_config in &config.locations {
        let location = build_location(location_config, metrics.clone())?;
        router.add_route(
            location_config.host.as_deref(),
            location_config.path_prefix.clone(),
            Arc::new(location),
        )?;
        tracing::info!(
            location = %location_config.name,
            host = ?location_config.host,
            prefix = %location_config.path_prefix,
            endpoints = location_config.endpoints.len(),
            "Configured location"
        );
    }
    Ok(router)
}
