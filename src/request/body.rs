// src/request/body.rs
use crate::errors::ProxyError;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use hyper::body::HttpBody;
use hyper::{Body, StatusCode};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum BodyReadError {
    #[error("Request body read timed out")]
    Timeout,

    #[error("Request body exceeds the maximum of {limit} bytes")]
    TooLarge { limit: usize },

    #[error("Failed to read request body: {0}")]
    Read(#[source] hyper::Error),
}

impl BodyReadError {
    pub fn to_proxy_error(&self) -> ProxyError {
        let status = match self {
            BodyReadError::Timeout => StatusCode::REQUEST_TIMEOUT,
            BodyReadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            BodyReadError::Read(_) => StatusCode::BAD_REQUEST,
        };
        ProxyError::from_status(status)
    }
}

impl From<hyper::Error> for BodyReadError {
    fn from(err: hyper::Error) -> Self {
        let timed_out = err.is_timeout()
            || std::error::Error::source(&err)
                .and_then(|source| source.downcast_ref::<std::io::Error>())
                .map(|io| io.kind() == std::io::ErrorKind::TimedOut)
                .unwrap_or(false);

        if timed_out {
            BodyReadError::Timeout
        } else {
            BodyReadError::Read(err)
        }
    }
}

/// Buffers an inbound body so it can be replayed against several endpoints.
///
/// Whatever the reader leaves unread stays in `body`; the proxy drains it
/// before answering.
#[async_trait]
pub trait BodyReader: Send + Sync {
    async fn read_body(&self, body: &mut Body) -> Result<Bytes, BodyReadError>;
}

/// Reads the whole body into memory, optionally bounded in size and time.
/// Without limits it buffers everything the client sends.
#[derive(Debug, Clone, Default)]
pub struct BoundedBodyReader {
    max_bytes: Option<usize>,
    read_timeout: Option<Duration>,
}

impl BoundedBodyReader {
    pub fn new(max_bytes: Option<usize>, read_timeout: Option<Duration>) -> Self {
        Self {
            max_bytes,
            read_timeout,
        }
    }

    pub fn max_bytes(&self) -> Option<usize> {
        self.max_bytes
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    async fn collect(&self, body: &mut Body) -> Result<Bytes, BodyReadError> {
        if let (Some(limit), Some(declared)) = (self.max_bytes, body.size_hint().exact()) {
            if declared > limit as u64 {
                return Err(BodyReadError::TooLarge { limit });
            }
        }

        let mut buf = BytesMut::new();
        while let Some(chunk) = body.data().await {
            let chunk = chunk?;
            if let Some(limit) = self.max_bytes {
                if buf.len() + chunk.len() > limit {
                    return Err(BodyReadError::TooLarge { limit });
                }
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

#[async_trait]
impl BodyReader for BoundedBodyReader {
    async fn read_body(&self, body: &mut Body) -> Result<Bytes, BodyReadError> {
        match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, self.collect(body))
                .await
                .map_err(|_| BodyReadError::Timeout)?,
            None => self.collect(body).await,
        }
    }
}

/// Discards whatever is left of `body` so the client sees our response
/// instead of a stuck upload. Gives up after `limit`.
pub async fn drain_body(body: &mut Body, limit: Duration) {
    let drain = async {
        while let Some(chunk) = body.data().await {
            if chunk.is_err() {
                break;
            }
        }
    };

    if tokio::time::timeout(limit, drain).await.is_err() {
        tracing::debug!(?limit, "Gave up draining request body");
    }
}
