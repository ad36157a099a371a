// src/request/mod.rs
mod body;
mod request;

pub use body::{drain_body, BodyReadError, BodyReader, BoundedBodyReader};
pub use request::ProxyRequest;
