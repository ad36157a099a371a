// src/errors/formatter.rs
use super::http_error::ProxyError;
use bytes::Bytes;
use hyper::StatusCode;
use serde_json::json;

/// What the proxy writes back when a request fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedError {
    pub status: StatusCode,
    pub body: Bytes,
    pub content_type: String,
}

/// Renders a [`ProxyError`] into status, body and content type.
pub trait ErrorFormatter: Send + Sync {
    fn format(&self, err: &ProxyError) -> FormattedError;
}

/// Default formatter, used when none is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormatter;

impl ErrorFormatter for JsonFormatter {
    fn format(&self, err: &ProxyError) -> FormattedError {
        let body = match err {
            ProxyError::Http(http) => match http.body() {
                Some(body) => body.clone(),
                None => to_json(json!({ "error": http.message() })),
            },
            ProxyError::Retry(retry) => to_json(json!({
                "error": err.message(),
                "retry-seconds": retry.seconds(),
            })),
        };

        FormattedError {
            status: err.status(),
            body,
            content_type: "application/json".to_string(),
        }
    }
}

fn to_json(value: serde_json::Value) -> Bytes {
    // Serializing a `Value` built from strings and integers cannot fail.
    Bytes::from(serde_json::to_vec(&value).unwrap_or_default())
}
