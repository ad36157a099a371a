// src/middleware/traits.rs
use crate::errors::{Error, ProxyError};
use crate::location::Attempt;
use crate::request::ProxyRequest;
use hyper::{Body, Response};

/// `Ok(None)` lets the request through; anything else becomes the attempt's outcome.
pub type Intercept = Result<Option<Response<Body>>, ProxyError>;

pub trait Middleware: Send + Sync {
    fn on_request(&self, req: &mut ProxyRequest) -> Intercept;

    /// Runs after every attempt whose request phase reached this middleware.
    /// The outcome is already decided at this point.
    fn on_response(&self, _req: &mut ProxyRequest, _attempt: &Attempt) {}
}

/// Notification-only hooks; they see the request but cannot change it.
pub trait Observer: Send + Sync {
    fn on_request(&self, req: &ProxyRequest);

    fn on_response(&self, req: &ProxyRequest, attempt: &Attempt);

    /// Closes an `on_request` that never became an attempt because no
    /// endpoint could be selected.
    fn on_failure(&self, _req: &ProxyRequest, _err: &Error) {}
}
