// src/middleware/rate_limit.rs
use super::traits::{Intercept, Middleware};
use crate::config::RateLimitConfig;
use crate::errors::ProxyError;
use crate::request::ProxyRequest;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Idle buckets are swept once every this many requests.
const EVICT_EVERY: u64 = 1024;

type KeyFn = Box<dyn Fn(&ProxyRequest) -> String + Send + Sync>;

struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    /// Takes a token, or reports how long until one is available.
    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> Result<(), Duration> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - self.tokens) / refill_rate))
        }
    }

    /// A bucket that has refilled completely is no different from a new one.
    fn is_full(&self, now: Instant, capacity: f64, refill_rate: f64) -> bool {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens + elapsed * refill_rate >= capacity
    }
}

/// Token-bucket limiter keyed by client. Rejections surface as a
/// [`ProxyError::Retry`] telling the caller when to come back.
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    buckets: DashMap<String, TokenBucket>,
    requests: AtomicU64,
    key: KeyFn,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            rate: config.requests_per_second,
            burst: f64::from(config.burst),
            buckets: DashMap::new(),
            requests: AtomicU64::new(0),
            key: Box::new(client_ip),
        }
    }

    /// Limits by something other than the client address (API key, user, ...).
    pub fn with_key<F>(mut self, key: F) -> Self
    where
        F: Fn(&ProxyRequest) -> String + Send + Sync + 'static,
    {
        self.key = Box::new(key);
        self
    }

    /// Drops buckets of clients that have been quiet long enough to refill.
    pub fn evict_idle(&self) {
        let now = Instant::now();
        self.buckets
            .retain(|_, bucket| !bucket.is_full(now, self.burst, self.rate));

        tracing::debug!(clients = self.buckets.len(), "Evicted idle rate limit buckets");
    }

    /// Number of clients with a bucket.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

fn client_ip(req: &ProxyRequest) -> String {
    req.remote_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

impl Middleware for RateLimiter {
    fn on_request(&self, req: &mut ProxyRequest) -> Intercept {
        let key = (self.key)(req);
        let verdict = self
            .buckets
            .entry(key.clone())
            .or_insert_with(|| TokenBucket::new(self.burst))
            .try_acquire(self.burst, self.rate);

        if self.requests.fetch_add(1, Ordering::Relaxed) % EVICT_EVERY == EVICT_EVERY - 1 {
            self.evict_idle();
        }

        match verdict {
            Ok(()) => Ok(None),
            Err(wait) => {
                let seconds = wait.as_secs_f64().ceil().max(1.0) as u64;
                tracing::warn!(
                    request_id = req.id(),
                    client = %key,
                    retry_seconds = seconds,
                    "Rate limit exceeded"
                );
                Err(ProxyError::retry(seconds))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::{Request, StatusCode};
    use std::net::SocketAddr;

    fn request(addr: &str) -> ProxyRequest {
        let (parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        ProxyRequest::new(1, parts, Some(addr.parse::<SocketAddr>().unwrap()))
    }

    #[test]
    fn allows_burst_then_asks_to_retry() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            requests_per_second: 0.5,
            burst: 2,
        });
        let mut req = request("10.0.0.1:5000");

        assert!(limiter.on_request(&mut req).unwrap().is_none());
        assert!(limiter.on_request(&mut req).unwrap().is_none());

        let err = limiter.on_request(&mut req).unwrap_err();
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.retry_seconds(), Some(2));
    }

    #[test]
    fn clients_have_separate_buckets() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            requests_per_second: 1.0,
            burst: 1,
        });

        assert!(limiter.on_request(&mut request("10.0.0.1:5000")).is_ok());
        assert!(limiter.on_request(&mut request("10.0.0.2:5000")).is_ok());
        assert!(limiter.on_request(&mut request("10.0.0.1:6000")).is_err());
    }

    #[test]
    fn custom_key() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            requests_per_second: 1.0,
            burst: 1,
        })
        .with_key(|_| "everyone".to_string());

        assert!(limiter.on_request(&mut request("10.0.0.1:5000")).is_ok());
        assert!(limiter.on_request(&mut request("10.0.0.2:5000")).is_err());
    }

    #[test]
    fn evicts_refilled_buckets() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            requests_per_second: 1000.0,
            burst: 1,
        });
        for client in 0..10 {
            let addr = format!("10.0.1.{}:5000", client);
            assert!(limiter.on_request(&mut request(&addr)).is_ok());
        }
        assert_eq!(limiter.tracked_clients(), 10);

        std::thread::sleep(Duration::from_millis(20));
        limiter.evict_idle();
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn keeps_depleted_buckets() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            requests_per_second: 0.001,
            burst: 1,
        });
        assert!(limiter.on_request(&mut request("10.0.0.1:5000")).is_ok());
        limiter.evict_idle();
        assert_eq!(limiter.tracked_clients(), 1);
        assert!(limiter.on_request(&mut request("10.0.0.1:5000")).is_err());
    }

    #[test]
    fn sweeps_periodically() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            requests_per_second: 1_000_000.0,
            burst: 1,
        });
        for client in 0..EVICT_EVERY {
            let addr = format!("10.{}.{}.1:5000", client / 256, client % 256);
            assert!(limiter.on_request(&mut request(&addr)).is_ok());
        }
        assert!(limiter.tracked_clients() < EVICT_EVERY as usize);
    }
}
