// src/load_balancer/endpoint.rs
use crate::errors::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use url::Url;

/// One backend address plus the runtime counters kept for it.
#[derive(Debug)]
pub struct Endpoint {
    id: String,
    url: Url,

    // Runtime state
    active_attempts: AtomicUsize,
    total_attempts: AtomicU64,
    failed_attempts: AtomicU64,
}

impl Endpoint {
    pub fn new(url: Url) -> Result<Self, Error> {
        let invalid = |reason: &str| Error::InvalidEndpoint {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(invalid("scheme must be http or https"));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;
        let id = format!("{}://{}:{}", url.scheme(), host, port);

        Ok(Self {
            id,
            url,
            active_attempts: AtomicUsize::new(0),
            total_attempts: AtomicU64::new(0),
            failed_attempts: AtomicU64::new(0),
        })
    }

    pub fn parse(raw: &str) -> Result<Self, Error> {
        let url = Url::parse(raw).map_err(|e| Error::InvalidEndpoint {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        Self::new(url)
    }

    /// `scheme://host:port`, unique within a pool.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn active_attempts(&self) -> usize {
        self.active_attempts.load(Ordering::Relaxed)
    }

    /// Marks an attempt as in flight until the returned guard goes away.
    pub fn begin_attempt(&self) -> AttemptGuard<'_> {
        self.active_attempts.fetch_add(1, Ordering::SeqCst);
        AttemptGuard { endpoint: self }
    }

    pub fn get_metrics(&self) -> EndpointMetrics {
        EndpointMetrics {
            active_attempts: self.active_attempts.load(Ordering::Relaxed),
            total_attempts: self.total_attempts.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// RAII guard for an in-flight attempt. Dropping it without calling
/// [`AttemptGuard::finish`] (a cancelled request) only releases the slot.
#[derive(Debug)]
pub struct AttemptGuard<'a> {
    endpoint: &'a Endpoint,
}

impl AttemptGuard<'_> {
    pub fn finish(self, success: bool) {
        self.endpoint.total_attempts.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.endpoint.failed_attempts.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.endpoint.active_attempts.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointMetrics {
    pub active_attempts: usize,
    pub total_attempts: u64,
    pub failed_attempts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_includes_default_port() {
        let e = Endpoint::parse("http://localhost/api").unwrap();
        assert_eq!(e.id(), "http://localhost:80");
        let e = Endpoint::parse("https://example.com").unwrap();
        assert_eq!(e.id(), "https://example.com:443");
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            Endpoint::parse("ftp://example.com"),
            Err(Error::InvalidEndpoint { .. })
        ));
        assert!(Endpoint::parse("not a url").is_err());
    }

    #[test]
    fn counts_attempts() {
        let e = Endpoint::parse("http://127.0.0.1:9000").unwrap();
        let guard = e.begin_attempt();
        assert_eq!(e.active_attempts(), 1);
        guard.finish(false);
        e.begin_attempt().finish(true);
        drop(e.begin_attempt());

        assert_eq!(
            e.get_metrics(),
            EndpointMetrics {
                active_attempts: 0,
                total_attempts: 2,
                failed_attempts: 1,
            }
        );
    }
}
