// src/load_balancer/mod.rs
mod algorithm;
mod endpoint;
mod round_robin;

pub use algorithm::LoadBalancer; // trait
pub use endpoint::{AttemptGuard, Endpoint, EndpointMetrics};
pub use round_robin::RoundRobin;
pub use crate::config::LoadBalancerAlgorithm;

use std::sync::Arc;

pub fn create_load_balancer(algorithm: LoadBalancerAlgorithm) -> Arc<dyn LoadBalancer> {
    match algorithm {
        LoadBalancerAlgorithm::RoundRobin => Arc::new(RoundRobin::new()),
    }
}
