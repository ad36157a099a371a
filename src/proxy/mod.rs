//
// src/proxy/mod.rs
//
mod proxy;

pub use proxy::{Proxy, ProxyOptions};
