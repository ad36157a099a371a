// src/errors/mod.rs
//! Error & retry model.
//!
//! Every failure inside the proxy ends up as one of two things: an
//! [`Error`] flowing through the dispatch pipeline, or a [`ProxyError`]
//! that knows how to render itself as an HTTP response. The [`Proxy`]
//! is the only place that turns the former into the latter.
//!
//! [`Proxy`]: crate::proxy::Proxy
mod error;
mod formatter;
mod http_error;
pub mod mapping;

pub use error::Error;
pub use formatter::{ErrorFormatter, FormattedError, JsonFormatter};
pub use http_error::{HttpError, ProxyError, RetryError};
pub use mapping::{error_from_fields, error_to_fields, MappingError};
