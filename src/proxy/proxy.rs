// ────────────────────────────────
// src/proxy/proxy.rs
// Front door: routes, buffers the body, hands off to a location and
// renders whatever went wrong.
// ────────────────────────────────

use crate::errors::{Error, ErrorFormatter, JsonFormatter, ProxyError};
use crate::request::{drain_body, BodyReader, BoundedBodyReader, ProxyRequest};
use crate::route::Router;
use hyper::header::{HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use hyper::{Body, Request, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info_span, warn, Instrument};

#[derive(Clone)]
pub struct ProxyOptions {
    /// Renders failed requests. JSON when unset.
    pub formatter: Option<Arc<dyn ErrorFormatter>>,
    /// How long to keep reading an abandoned request body before giving up.
    pub drain_timeout: Duration,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            formatter: None,
            drain_timeout: Duration::from_secs(5),
        }
    }
}

pub struct Proxy {
    router: Arc<dyn Router>,
    formatter: Arc<dyn ErrorFormatter>,
    default_reader: BoundedBodyReader,
    drain_timeout: Duration,
    last_request_id: AtomicU64,
}

impl Proxy {
    pub fn new(router: Arc<dyn Router>) -> Self {
        Self::with_options(router, ProxyOptions::default())
    }

    pub fn with_options(router: Arc<dyn Router>, options: ProxyOptions) -> Self {
        Self {
            router,
            formatter: options
                .formatter
                .unwrap_or_else(|| Arc::new(JsonFormatter)),
            default_reader: BoundedBodyReader::default(),
            drain_timeout: options.drain_timeout,
            last_request_id: AtomicU64::new(0),
        }
    }

    /// Serves one inbound request. Failures are rendered into the response,
    /// so this never returns an error.
    pub async fn handle(&self, req: Request<Body>, remote_addr: Option<SocketAddr>) -> Response<Body> {
        let id = self.last_request_id.fetch_add(1, Ordering::SeqCst) + 1;
        let span = info_span!(
            "request",
            request_id = id,
            method = %req.method(),
            path = %req.uri().path(),
        );

        async move {
            let (parts, mut body) = req.into_parts();
            let mut proxy_req = ProxyRequest::new(id, parts, remote_addr);

            match self.dispatch(&mut proxy_req, &mut body).await {
                Ok(response) => response,
                Err(err) => {
                    drain_body(&mut body, self.drain_timeout).await;
                    self.error_response(&err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, req: &mut ProxyRequest, body: &mut Body) -> Result<Response<Body>, Error> {
        let location = match self.router.route(req)? {
            Some(location) => location,
            None => {
                error!(host = ?req.host(), "No location matches request");
                return Err(ProxyError::from_status(StatusCode::BAD_GATEWAY).into());
            }
        };

        let default_reader: &dyn BodyReader = &self.default_reader;
        let reader = location.body_reader().unwrap_or(default_reader);
        let bytes = reader.read_body(body).await.map_err(|e| {
            error!(location = location.name(), error = %e, "Failed to read request body");
            Error::from(e.to_proxy_error())
        })?;
        req.set_body(bytes);

        let response = location.round_trip(req).await.map_err(|e| {
            warn!(location = location.name(), error = %e, "Request failed");
            e
        })?;

        // Status and headers go back as the backend sent them; the body streams through.
        let (parts, body) = response.into_parts();
        let mut out = Response::new(body);
        *out.status_mut() = parts.status;
        *out.headers_mut() = parts.headers;
        Ok(out)
    }

    fn error_response(&self, err: &Error) -> Response<Body> {
        let proxy_error = err.to_proxy_error();
        let formatted = self.formatter.format(&proxy_error);

        let mut response = Response::new(Body::from(formatted.body));
        *response.status_mut() = formatted.status;
        let headers = response.headers_mut();
        if let Ok(content_type) = HeaderValue::from_str(&formatted.content_type) {
            headers.insert(CONTENT_TYPE, content_type);
        }
        if let Some(seconds) = proxy_error.retry_seconds() {
            headers.insert(RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}
