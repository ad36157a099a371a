// src/middleware/mod.rs
//! Interceptors attached to a location.
//!
//! Middlewares may answer a request themselves and keep it from reaching a
//! backend; observers only watch. Both run once per attempt, in the order
//! they were appended.
mod chain;
mod circuit_breaker;
mod rate_limit;
mod traits;
mod wrapper;

pub use chain::{Chain, ChainEntry};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerMetrics, CircuitState};
pub use rate_limit::RateLimiter;
pub use traits::{Intercept, Middleware, Observer};
pub use wrapper::{MiddlewareWrapper, ObserverWrapper};

pub type MiddlewareChain = Chain<dyn Middleware>;
pub type ObserverChain = Chain<dyn Observer>;
