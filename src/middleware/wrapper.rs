// src/middleware/wrapper.rs
use super::traits::{Intercept, Middleware, Observer};
use crate::errors::Error;
use crate::location::Attempt;
use crate::request::ProxyRequest;

type RequestHook = Box<dyn Fn(&mut ProxyRequest) -> Intercept + Send + Sync>;
type ResponseHook = Box<dyn Fn(&mut ProxyRequest, &Attempt) + Send + Sync>;
type ObserveRequestHook = Box<dyn Fn(&ProxyRequest) + Send + Sync>;
type ObserveResponseHook = Box<dyn Fn(&ProxyRequest, &Attempt) + Send + Sync>;
type ObserveFailureHook = Box<dyn Fn(&ProxyRequest, &Error) + Send + Sync>;

/// Builds a [`Middleware`] out of closures. Missing hooks are no-ops.
#[derive(Default)]
pub struct MiddlewareWrapper {
    request: Option<RequestHook>,
    response: Option<ResponseHook>,
}

impl MiddlewareWrapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ProxyRequest) -> Intercept + Send + Sync + 'static,
    {
        self.request = Some(Box::new(f));
        self
    }

    pub fn with_response_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ProxyRequest, &Attempt) + Send + Sync + 'static,
    {
        self.response = Some(Box::new(f));
        self
    }
}

impl Middleware for MiddlewareWrapper {
    fn on_request(&self, req: &mut ProxyRequest) -> Intercept {
        match &self.request {
            Some(hook) => hook(req),
            None => Ok(None),
        }
    }

    fn on_response(&self, req: &mut ProxyRequest, attempt: &Attempt) {
        if let Some(hook) = &self.response {
            hook(req, attempt);
        }
    }
}

/// Builds an [`Observer`] out of closures.
#[derive(Default)]
pub struct ObserverWrapper {
    request: Option<ObserveRequestHook>,
    response: Option<ObserveResponseHook>,
    failure: Option<ObserveFailureHook>,
}

impl ObserverWrapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(&ProxyRequest) + Send + Sync + 'static,
    {
        self.request = Some(Box::new(f));
        self
    }

    pub fn with_response_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(&ProxyRequest, &Attempt) + Send + Sync + 'static,
    {
        self.response = Some(Box::new(f));
        self
    }

    pub fn with_failure_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(&ProxyRequest, &Error) + Send + Sync + 'static,
    {
        self.failure = Some(Box::new(f));
        self
    }
}

impl Observer for ObserverWrapper {
    fn on_request(&self, req: &ProxyRequest) {
        if let Some(hook) = &self.request {
            hook(req);
        }
    }

    fn on_response(&self, req: &ProxyRequest, attempt: &Attempt) {
        if let Some(hook) = &self.response {
            hook(req, attempt);
        }
    }

    fn on_failure(&self, req: &ProxyRequest, err: &Error) {
        if let Some(hook) = &self.failure {
            hook(req, err);
        }
    }
}
