// src/load_balancer/algorithm.rs
use super::Endpoint;
use crate::errors::Error;
use crate::request::ProxyRequest;
use std::sync::Arc;

/// Owns a pool of endpoints and decides which one the next attempt goes to.
///
/// Implementations are shared by every in-flight request of a location, so
/// selection and pool changes must be safe to call concurrently.
pub trait LoadBalancer: Send + Sync {
    fn next_endpoint(&self, req: &ProxyRequest) -> Result<Arc<Endpoint>, Error>;

    fn add_endpoint(&self, endpoint: Endpoint) -> Result<(), Error>;

    fn remove_endpoint(&self, id: &str) -> Result<(), Error>;

    fn endpoints(&self) -> Vec<Arc<Endpoint>>;

    fn name(&self) -> &'static str;
}
