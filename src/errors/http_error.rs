// src/errors/http_error.rs
use bytes::Bytes;
use hyper::StatusCode;
use std::fmt;

/// Error value that can be rendered to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    #[error("{0}")]
    Http(HttpError),

    #[error("{0}")]
    Retry(RetryError),
}

impl ProxyError {
    /// Error carrying only a status and its standard reason phrase.
    pub fn from_status(status: StatusCode) -> Self {
        ProxyError::Http(HttpError::from_status(status))
    }

    pub fn retry(seconds: u64) -> Self {
        ProxyError::Retry(RetryError::new(seconds))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Http(err) => err.status(),
            ProxyError::Retry(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ProxyError::Http(err) => err.message(),
            ProxyError::Retry(_) => reason_phrase(StatusCode::TOO_MANY_REQUESTS),
        }
    }

    pub fn retry_seconds(&self) -> Option<u64> {
        match self {
            ProxyError::Retry(err) => Some(err.seconds()),
            ProxyError::Http(_) => None,
        }
    }
}

impl From<HttpError> for ProxyError {
    fn from(err: HttpError) -> Self {
        ProxyError::Http(err)
    }
}

impl From<RetryError> for ProxyError {
    fn from(err: RetryError) -> Self {
        ProxyError::Retry(err)
    }
}

/// Status-mapped error with an optional pre-rendered body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    status: StatusCode,
    message: String,
    body: Option<Bytes>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>, body: Option<Bytes>) -> Self {
        Self {
            status,
            message: message.into(),
            body,
        }
    }

    pub fn from_status(status: StatusCode) -> Self {
        Self::new(status, reason_phrase(status), None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.message)
    }
}

/// Rate-limit signal: the caller should come back after `seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryError {
    seconds: u64,
}

impl RetryError {
    pub fn new(seconds: u64) -> Self {
        Self { seconds }
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }
}

impl fmt::Display for RetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "too many requests, retry in {}s", self.seconds)
    }
}

pub(crate) fn reason_phrase(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_uses_reason_phrase() {
        let err = ProxyError::from_status(StatusCode::BAD_GATEWAY);
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.message(), "Bad Gateway");
        assert_eq!(err.to_string(), "502 Bad Gateway");
    }

    #[test]
    fn retry_error_is_always_429() {
        let err = ProxyError::retry(5);
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.retry_seconds(), Some(5));
        assert_eq!(err.message(), "Too Many Requests");
    }
}
