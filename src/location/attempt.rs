// src/location/attempt.rs
use crate::errors::Error;
use crate::load_balancer::Endpoint;
use hyper::{Body, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// What a single try produced: a response or a failure, never both.
#[derive(Debug)]
pub enum AttemptOutcome {
    Response(Response<Body>),
    Error(Error),
}

/// Record of one try against one endpoint.
#[derive(Debug)]
pub struct Attempt {
    endpoint: Arc<Endpoint>,
    outcome: AttemptOutcome,
    duration: Duration,
    intercepted: bool,
}

impl Attempt {
    pub fn new(
        endpoint: Arc<Endpoint>,
        outcome: AttemptOutcome,
        duration: Duration,
        intercepted: bool,
    ) -> Self {
        Self {
            endpoint,
            outcome,
            duration,
            intercepted,
        }
    }

    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    pub fn outcome(&self) -> &AttemptOutcome {
        &self.outcome
    }

    pub fn response(&self) -> Option<&Response<Body>> {
        match &self.outcome {
            AttemptOutcome::Response(response) => Some(response),
            AttemptOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match &self.outcome {
            AttemptOutcome::Error(err) => Some(err),
            AttemptOutcome::Response(_) => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(|r| r.status())
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// True when a middleware answered and the backend was never called.
    pub fn is_intercepted(&self) -> bool {
        self.intercepted
    }

    pub fn summary(&self) -> AttemptSummary {
        AttemptSummary {
            endpoint: self.endpoint.id().to_string(),
            status: self.status(),
            error: self.error().map(|e| e.to_string()),
            duration: self.duration,
            intercepted: self.intercepted,
        }
    }

    pub fn into_result(self) -> Result<Response<Body>, Error> {
        match self.outcome {
            AttemptOutcome::Response(response) => Ok(response),
            AttemptOutcome::Error(err) => Err(err),
        }
    }
}

/// Body-less copy of an [`Attempt`] kept on the request for later inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptSummary {
    pub endpoint: String,
    pub status: Option<StatusCode>,
    pub error: Option<String>,
    pub duration: Duration,
    pub intercepted: bool,
}
