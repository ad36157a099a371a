// src/location/mod.rs
mod attempt;
mod failover;
mod location;
mod rewrite;
mod transport;

pub use attempt::{Attempt, AttemptOutcome, AttemptSummary};
pub use failover::{FailoverPolicy, RetryDecision};
pub use location::{HttpLocation, Location, LocationOptions};
pub use rewrite::upstream_request;
pub use transport::{HttpTransport, Transport};
