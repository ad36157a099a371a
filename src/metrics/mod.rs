// src/metrics/mod.rs
mod collector;
mod observer;

pub use collector::{MetricsCollector, MetricsRegistry};
pub use observer::MetricsObserver;
