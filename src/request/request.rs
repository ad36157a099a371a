// src/request/request.rs
use crate::location::AttemptSummary;
use bytes::Bytes;
use hyper::http::request::Parts;
use hyper::{HeaderMap, Method, Uri, Version};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

/// An inbound request as seen by routers, locations and interceptors.
///
/// The body is buffered up front so every attempt against a backend sees
/// the same bytes. Attributes are a scratch space interceptors share for the
/// lifetime of the request (auth context, timings, ...).
#[derive(Debug)]
pub struct ProxyRequest {
    id: u64,
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
    body: Bytes,
    attributes: HashMap<String, Value>,
    attempts: Vec<AttemptSummary>,
}

impl ProxyRequest {
    pub fn new(id: u64, parts: Parts, remote_addr: Option<SocketAddr>) -> Self {
        Self {
            id,
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            remote_addr,
            body: Bytes::new(),
            attributes: HashMap::new(),
            attempts: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Host the client asked for, from the URI authority or the Host header.
    pub fn host(&self) -> Option<&str> {
        self.uri.host().or_else(|| {
            self.headers
                .get(hyper::header::HOST)
                .and_then(|h| h.to_str().ok())
        })
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    /// Attempts made so far, oldest first.
    pub fn attempts(&self) -> &[AttemptSummary] {
        &self.attempts
    }

    pub(crate) fn record_attempt(&mut self, summary: AttemptSummary) {
        self.attempts.push(summary);
    }
}

impl fmt::Display for ProxyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Request(id={}, {} {})", self.id, self.method, self.uri)
    }
}
