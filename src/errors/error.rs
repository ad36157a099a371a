// src/errors/error.rs
use super::http_error::ProxyError;
use hyper::{Method, StatusCode};
use std::time::Duration;

/// Errors raised anywhere in the dispatch pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Already carries its own HTTP rendering (middleware verdicts, ingress errors).
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("No available endpoints")]
    NoAvailableEndpoints,

    #[error("Endpoint {0} already exists")]
    EndpointExists(String),

    #[error("Endpoint {0} not found")]
    EndpointNotFound(String),

    #[error("Invalid endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("Chain entry {0} already exists")]
    DuplicateName(String),

    #[error("Chain entry {0} not found")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(#[from] hyper::Error),

    #[error("Backend did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Connect, refused, reset and timeout failures: the backend never produced a response.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout(_))
    }

    /// True when handing the request to another endpoint cannot repeat work
    /// a backend already did: the connection was never established, or the
    /// method is idempotent. Responses that time out are always retried.
    pub fn is_retryable(&self, method: &Method) -> bool {
        match self {
            Error::Transport(err) => err.is_connect() || is_idempotent(method),
            Error::Timeout(_) => true,
            _ => false,
        }
    }

    /// Resolves the error into something the formatter can render.
    pub fn to_proxy_error(&self) -> ProxyError {
        match self {
            Error::Proxy(err) => err.clone(),
            Error::Internal(_) => ProxyError::from_status(StatusCode::INTERNAL_SERVER_ERROR),
            _ => ProxyError::from_status(StatusCode::BAD_GATEWAY),
        }
    }
}

fn is_idempotent(method: &Method) -> bool {
    [
        Method::GET,
        Method::HEAD,
        Method::OPTIONS,
        Method::TRACE,
        Method::PUT,
        Method::DELETE,
    ]
    .contains(method)
}

impl From<hyper::http::Error> for Error {
    fn from(err: hyper::http::Error) -> Self {
        Error::Internal(err.to_string())
    }
}
