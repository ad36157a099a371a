// src/location/rewrite.rs
use crate::errors::Error;
use crate::load_balancer::Endpoint;
use crate::request::ProxyRequest;
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::{Body, Request, Uri, Version};

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

// Headers that only make sense for a single hop.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Builds the request sent to `endpoint` for one attempt.
///
/// The path and query are kept, the authority is the endpoint's. The body
/// is a cheap clone of the buffered bytes so later attempts can replay it.
pub fn upstream_request(
    req: &ProxyRequest,
    endpoint: &Endpoint,
    trust_forward_header: bool,
) -> Result<Request<Body>, Error> {
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let uri: Uri = format!("{}{}", endpoint.id(), path_and_query)
        .parse()
        .map_err(|e: hyper::http::uri::InvalidUri| Error::Internal(e.to_string()))?;

    let mut headers = req.headers().clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::CONTENT_LENGTH);
    set_forwarded_headers(&mut headers, req, trust_forward_header);

    let mut builder = Request::builder()
        .method(req.method().clone())
        .uri(uri)
        .version(Version::HTTP_11);
    if let Some(target) = builder.headers_mut() {
        *target = headers;
    }

    Ok(builder.body(Body::from(req.body().clone()))?)
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in &listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn set_forwarded_headers(headers: &mut HeaderMap, req: &ProxyRequest, trust: bool) {
    if !trust {
        headers.remove(X_FORWARDED_FOR);
        headers.remove(X_FORWARDED_PROTO);
        headers.remove(X_FORWARDED_HOST);
    }

    if let Some(addr) = req.remote_addr() {
        let client_ip = addr.ip().to_string();
        let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) if !prior.is_empty() => format!("{}, {}", prior, client_ip),
            _ => client_ip,
        };
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if !headers.contains_key(X_FORWARDED_PROTO) {
        let proto = req.uri().scheme_str().unwrap_or("http");
        if let Ok(value) = HeaderValue::from_str(proto) {
            headers.insert(X_FORWARDED_PROTO, value);
        }
    }

    if !headers.contains_key(X_FORWARDED_HOST) {
        if let Some(value) = req.headers().get(header::HOST).cloned() {
            headers.insert(X_FORWARDED_HOST, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;
    use std::net::SocketAddr;

    fn request(trusted_prior: bool) -> ProxyRequest {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/items?page=2")
            .header("Host", "front.example.com")
            .header("Connection", "keep-alive, x-session-hint")
            .header("Keep-Alive", "timeout=5")
            .header("X-Session-Hint", "abc")
            .header("Content-Length", "5")
            .header("Accept", "application/json");
        if trusted_prior {
            builder = builder
                .header("X-Forwarded-For", "10.0.0.1")
                .header("X-Forwarded-Proto", "https");
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        let addr: SocketAddr = "192.168.1.20:55000".parse().unwrap();
        ProxyRequest::new(1, parts, Some(addr)).with_body("hello")
    }

    #[test]
    fn targets_endpoint_and_strips_hop_headers() {
        let endpoint = Endpoint::parse("http://127.0.0.1:9001").unwrap();
        let upstream = upstream_request(&request(false), &endpoint, false).unwrap();

        assert_eq!(upstream.uri(), "http://127.0.0.1:9001/api/items?page=2");
        assert_eq!(upstream.method(), Method::POST);
        let headers = upstream.headers();
        assert!(headers.get("connection").is_none());
        assert!(headers.get("keep-alive").is_none());
        assert!(headers.get("x-session-hint").is_none());
        assert!(headers.get("content-length").is_none());
        assert_eq!(headers["accept"], "application/json");
        assert_eq!(headers["host"], "front.example.com");
        assert_eq!(headers[X_FORWARDED_FOR], "192.168.1.20");
        assert_eq!(headers[X_FORWARDED_PROTO], "http");
        assert_eq!(headers[X_FORWARDED_HOST], "front.example.com");
    }

    #[test]
    fn appends_to_trusted_forward_headers() {
        let endpoint = Endpoint::parse("http://127.0.0.1:9001").unwrap();

        let trusted = upstream_request(&request(true), &endpoint, true).unwrap();
        assert_eq!(trusted.headers()[X_FORWARDED_FOR], "10.0.0.1, 192.168.1.20");
        assert_eq!(trusted.headers()[X_FORWARDED_PROTO], "https");

        let untrusted = upstream_request(&request(true), &endpoint, false).unwrap();
        assert_eq!(untrusted.headers()[X_FORWARDED_FOR], "192.168.1.20");
        assert_eq!(untrusted.headers()[X_FORWARDED_PROTO], "http");
    }
}
