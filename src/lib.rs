// src/lib.rs
pub mod config;
pub mod errors;
pub mod load_balancer;
pub mod location;
pub mod metrics;
pub mod middleware;
pub mod proxy;
pub mod request;
pub mod route;
pub mod server;

pub use errors::{Error, ProxyError};
pub use proxy::{Proxy, ProxyOptions};
