// src/config/models.rs
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    pub locations: Vec<LocationConfig>,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9090,
            path: "/metrics".to_string(),
        }
    }
}

/// One group of endpoints and how requests reach it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocationConfig {
    pub name: String,

    /// Matched against the request host, case-insensitively and without port.
    pub host: Option<String>,

    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,

    pub endpoints: Vec<String>,

    #[serde(default)]
    pub algorithm: LoadBalancerAlgorithm,

    /// Append to incoming X-Forwarded-* headers instead of replacing them.
    #[serde(default)]
    pub trust_forward_header: bool,

    pub max_body_bytes: Option<usize>,

    pub body_read_timeout_ms: Option<u64>,

    #[serde(default = "default_backend_timeout_ms")]
    pub backend_timeout_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default)]
    pub failover: FailoverConfig,

    pub rate_limit: Option<RateLimitConfig>,

    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

fn default_path_prefix() -> String {
    "/".to_string()
}

fn default_backend_timeout_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancerAlgorithm {
    #[default]
    RoundRobin,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FailoverConfig {
    /// Attempts per request; one per endpoint when unset.
    pub max_attempts: Option<u32>,

    /// Response statuses that count as failures worth another endpoint.
    pub retryable_statuses: Vec<u16>,

    /// 0 disables backoff between attempts.
    pub backoff_base_ms: u64,

    pub backoff_max_ms: u64,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            retryable_statuses: Vec::new(),
            backoff_base_ms: 0,
            backoff_max_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub requests_per_second: f64,
    pub burst: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    #[serde(default = "default_breaker_timeout_ms")]
    pub timeout_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_breaker_timeout_ms() -> u64 {
    30_000
}
