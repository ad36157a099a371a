// src/location/location.rs
use super::attempt::{Attempt, AttemptOutcome};
use super::failover::{FailoverPolicy, RetryDecision};
use super::rewrite::upstream_request;
use super::transport::{HttpTransport, Transport};
use crate::config::FailoverConfig;
use crate::errors::Error;
use crate::load_balancer::{Endpoint, LoadBalancer};
use crate::middleware::{ChainEntry, MiddlewareChain, Observer, ObserverChain};
use crate::request::{BodyReader, BoundedBodyReader, ProxyRequest};
use async_trait::async_trait;
use hyper::{Body, Response};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A named group of backends that requests get routed to.
#[async_trait]
pub trait Location: Send + Sync {
    fn name(&self) -> &str;

    /// Sends the request to a backend, failing over to other endpoints
    /// while the failover policy allows it.
    async fn round_trip(&self, req: &mut ProxyRequest) -> Result<Response<Body>, Error>;

    /// Reader used for the inbound body, `None` for the proxy's default.
    fn body_reader(&self) -> Option<&dyn BodyReader> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct LocationOptions {
    pub trust_forward_header: bool,
    pub max_body_bytes: Option<usize>,
    pub body_read_timeout: Option<Duration>,
    pub backend_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub failover: FailoverConfig,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            trust_forward_header: false,
            max_body_bytes: None,
            body_read_timeout: None,
            backend_timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(5)),
            failover: FailoverConfig::default(),
        }
    }
}

pub struct HttpLocation {
    name: String,
    load_balancer: Arc<dyn LoadBalancer>,
    middlewares: MiddlewareChain,
    observers: ObserverChain,
    transport: Arc<dyn Transport>,
    failover: FailoverPolicy,
    body_reader: Option<BoundedBodyReader>,
    trust_forward_header: bool,
}

impl HttpLocation {
    pub fn new(name: impl Into<String>, load_balancer: Arc<dyn LoadBalancer>) -> Self {
        Self::with_options(name, load_balancer, LocationOptions::default())
    }

    pub fn with_options(
        name: impl Into<String>,
        load_balancer: Arc<dyn LoadBalancer>,
        options: LocationOptions,
    ) -> Self {
        let body_reader = if options.max_body_bytes.is_some() || options.body_read_timeout.is_some()
        {
            Some(BoundedBodyReader::new(
                options.max_body_bytes,
                options.body_read_timeout,
            ))
        } else {
            None
        };

        Self {
            name: name.into(),
            load_balancer,
            middlewares: MiddlewareChain::new(),
            observers: ObserverChain::new(),
            transport: Arc::new(HttpTransport::new(
                options.connect_timeout,
                options.backend_timeout,
            )),
            failover: FailoverPolicy::new(options.failover),
            body_reader,
            trust_forward_header: options.trust_forward_header,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn load_balancer(&self) -> &Arc<dyn LoadBalancer> {
        &self.load_balancer
    }

    pub fn middleware_chain(&self) -> &MiddlewareChain {
        &self.middlewares
    }

    pub fn observer_chain(&self) -> &ObserverChain {
        &self.observers
    }

    /// Next endpoint this request has not tried yet.
    ///
    /// The cursor is shared with every other in-flight request, so the
    /// balancer may hand back an endpoint this request already failed on.
    /// Ask again up to once per pool member, then fall back to the first
    /// untried member. When everything has been tried the pick stands.
    fn select_endpoint(
        &self,
        req: &ProxyRequest,
        tried: &HashSet<String>,
    ) -> Result<Arc<Endpoint>, Error> {
        let mut endpoint = self.load_balancer.next_endpoint(req)?;
        if tried.is_empty() {
            return Ok(endpoint);
        }

        let pool = self.load_balancer.endpoints();
        for _ in 0..pool.len() {
            if !tried.contains(endpoint.id()) {
                return Ok(endpoint);
            }
            endpoint = self.load_balancer.next_endpoint(req)?;
        }

        if tried.contains(endpoint.id()) {
            if let Some(untried) = pool.into_iter().find(|e| !tried.contains(e.id())) {
                return Ok(untried);
            }
        }
        Ok(endpoint)
    }

    /// One pass through the middlewares and, unless one of them answers,
    /// the backend.
    async fn attempt(
        &self,
        req: &mut ProxyRequest,
        endpoint: Arc<Endpoint>,
        observers: &[ChainEntry<dyn Observer>],
    ) -> Attempt {
        let middlewares = self.middlewares.snapshot();

        let started = Instant::now();
        let mut ran = 0;
        let mut short_circuit = None;
        for entry in middlewares.iter() {
            ran += 1;
            match entry.handler().on_request(req) {
                Ok(None) => {}
                Ok(Some(response)) => {
                    short_circuit = Some(AttemptOutcome::Response(response));
                }
                Err(err) => {
                    short_circuit = Some(AttemptOutcome::Error(err.into()));
                }
            }
            if short_circuit.is_some() {
                debug!(location = %self.name, middleware = entry.name(), "Request intercepted");
                break;
            }
        }

        let intercepted = short_circuit.is_some();
        let outcome = match short_circuit {
            Some(outcome) => outcome,
            None => self.forward(req, &endpoint).await,
        };

        let attempt = Attempt::new(endpoint, outcome, started.elapsed(), intercepted);
        debug!(
            location = %self.name,
            endpoint = %attempt.endpoint(),
            status = ?attempt.status(),
            duration_ms = attempt.duration().as_millis() as u64,
            "Attempt finished"
        );
        req.record_attempt(attempt.summary());

        for entry in &middlewares[..ran] {
            entry.handler().on_response(req, &attempt);
        }
        for observer in observers.iter() {
            observer.handler().on_response(req, &attempt);
        }

        attempt
    }

    async fn forward(&self, req: &ProxyRequest, endpoint: &Endpoint) -> AttemptOutcome {
        let upstream = match upstream_request(req, endpoint, self.trust_forward_header) {
            Ok(upstream) => upstream,
            Err(err) => return AttemptOutcome::Error(err),
        };

        let guard = endpoint.begin_attempt();
        let result = self.transport.send(upstream).await;
        guard.finish(matches!(&result, Ok(r) if !r.status().is_server_error()));

        match result {
            Ok(response) => AttemptOutcome::Response(response),
            Err(err) => AttemptOutcome::Error(err),
        }
    }
}

#[async_trait]
impl Location for HttpLocation {
    fn name(&self) -> &str {
        &self.name
    }

    async fn round_trip(&self, req: &mut ProxyRequest) -> Result<Response<Body>, Error> {
        let budget = self.failover.budget(self.load_balancer.endpoints().len());
        let mut tried = HashSet::new();
        let mut attempt_no = 0;

        loop {
            attempt_no += 1;

            // Changes to the chains apply from the next attempt on.
            let observers = self.observers.snapshot();
            for observer in observers.iter() {
                observer.handler().on_request(req);
            }

            let endpoint = match self.select_endpoint(req, &tried) {
                Ok(endpoint) => endpoint,
                Err(err) => {
                    for observer in observers.iter() {
                        observer.handler().on_failure(req, &err);
                    }
                    return Err(err);
                }
            };
            tried.insert(endpoint.id().to_string());
            let attempt = self.attempt(req, endpoint, &observers).await;

            match self
                .failover
                .should_retry(req.method(), &attempt, attempt_no, budget)
            {
                RetryDecision::NoRetry => return attempt.into_result(),
                RetryDecision::Retry => {
                    warn!(
                        location = %self.name,
                        endpoint = %attempt.endpoint(),
                        attempt = attempt_no,
                        budget,
                        status = ?attempt.status(),
                        error = ?attempt.error().map(|e| e.to_string()),
                        "Attempt failed, failing over"
                    );
                    drop(attempt);

                    if let Some(delay) = self.failover.backoff(attempt_no) {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    fn body_reader(&self) -> Option<&dyn BodyReader> {
        self.body_reader.as_ref().map(|r| r as &dyn BodyReader)
    }
}
