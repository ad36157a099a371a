// src/route/mod.rs
use crate::errors::Error;
use crate::location::Location;
use crate::request::ProxyRequest;
use std::sync::Arc;

/// Picks the location that should serve a request.
///
/// `Ok(None)` means nothing matched; the proxy answers that with 502.
pub trait Router: Send + Sync {
    fn route(&self, req: &ProxyRequest) -> Result<Option<Arc<dyn Location>>, Error>;
}

/// Sends everything to one location.
pub struct ConstRouter {
    location: Arc<dyn Location>,
}

impl ConstRouter {
    pub fn new(location: Arc<dyn Location>) -> Self {
        Self { location }
    }
}

impl Router for ConstRouter {
    fn route(&self, _req: &ProxyRequest) -> Result<Option<Arc<dyn Location>>, Error> {
        Ok(Some(self.location.clone()))
    }
}

struct PathRoute {
    host: Option<String>,
    prefix: String,
    location: Arc<dyn Location>,
}

impl PathRoute {
    fn matches(&self, host: Option<&str>, path: &str) -> bool {
        if let Some(expected) = &self.host {
            match host {
                Some(host) if strip_port(host).eq_ignore_ascii_case(expected) => {}
                _ => return false,
            }
        }
        path.starts_with(&self.prefix)
    }
}

/// Matches on an optional host and the longest path prefix.
///
/// Host comparison ignores case and any port. Among routes with the same
/// prefix length, one bound to a host wins over a catch-all.
#[derive(Default)]
pub struct PathRouter {
    routes: Vec<PathRoute>,
}

impl PathRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(
        &mut self,
        host: Option<&str>,
        prefix: impl Into<String>,
        location: Arc<dyn Location>,
    ) -> Result<(), Error> {
        let host = host.map(|h| strip_port(h).to_ascii_lowercase());
        let mut prefix = prefix.into();
        if !prefix.starts_with('/') {
            prefix.insert(0, '/');
        }

        if self
            .routes
            .iter()
            .any(|r| r.host == host && r.prefix == prefix)
        {
            return Err(Error::DuplicateName(format!(
                "{}{}",
                host.as_deref().unwrap_or("*"),
                prefix
            )));
        }

        self.routes.push(PathRoute {
            host,
            prefix,
            location,
        });
        // Most specific first.
        self.routes.sort_by(|a, b| {
            b.prefix
                .len()
                .cmp(&a.prefix.len())
                .then_with(|| b.host.is_some().cmp(&a.host.is_some()))
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Router for PathRouter {
    fn route(&self, req: &ProxyRequest) -> Result<Option<Arc<dyn Location>>, Error> {
        let path = req.uri().path();
        Ok(self
            .routes
            .iter()
            .find(|r| r.matches(req.host(), path))
            .map(|r| r.location.clone()))
    }
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literals carry colons of their own.
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    host.split(':').next().unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hyper::{Body, Request, Response};

    struct Named(&'static str);

    #[async_trait]
    impl Location for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn round_trip(&self, _req: &mut ProxyRequest) -> Result<Response<Body>, Error> {
            Ok(Response::new(Body::empty()))
        }
    }

    fn request(host: &str, path: &str) -> ProxyRequest {
        let (parts, _) = Request::builder()
            .uri(path)
            .header("Host", host)
            .body(())
            .unwrap()
            .into_parts();
        ProxyRequest::new(1, parts, None)
    }

    fn routed(router: &dyn Router, host: &str, path: &str) -> Option<String> {
        router
            .route(&request(host, path))
            .unwrap()
            .map(|l| l.name().to_string())
    }

    #[test]
    fn const_router_always_matches() {
        let router = ConstRouter::new(Arc::new(Named("only")));
        assert_eq!(routed(&router, "any", "/x").as_deref(), Some("only"));
    }

    #[test]
    fn longest_prefix_wins() {
        let mut router = PathRouter::new();
        router.add_route(None, "/", Arc::new(Named("root"))).unwrap();
        router.add_route(None, "/api", Arc::new(Named("api"))).unwrap();
        router
            .add_route(None, "/api/v2", Arc::new(Named("v2")))
            .unwrap();

        assert_eq!(routed(&router, "h", "/api/v2/users").as_deref(), Some("v2"));
        assert_eq!(routed(&router, "h", "/api/v1").as_deref(), Some("api"));
        assert_eq!(routed(&router, "h", "/static").as_deref(), Some("root"));
    }

    #[test]
    fn host_match_ignores_case_and_port() {
        let mut router = PathRouter::new();
        router
            .add_route(Some("Example.com"), "/", Arc::new(Named("example")))
            .unwrap();
        router.add_route(None, "/", Arc::new(Named("fallback"))).unwrap();

        assert_eq!(
            routed(&router, "EXAMPLE.com:8080", "/").as_deref(),
            Some("example")
        );
        assert_eq!(routed(&router, "other.org", "/").as_deref(), Some("fallback"));
    }

    #[test]
    fn no_match_is_none() {
        let mut router = PathRouter::new();
        router
            .add_route(Some("example.com"), "/api", Arc::new(Named("api")))
            .unwrap();
        assert!(routed(&router, "example.com", "/web").is_none());
        assert!(routed(&router, "other.com", "/api").is_none());
    }

    #[test]
    fn duplicate_routes_are_rejected() {
        let mut router = PathRouter::new();
        router.add_route(None, "/a", Arc::new(Named("a"))).unwrap();
        assert!(matches!(
            router.add_route(None, "a", Arc::new(Named("b"))),
            Err(Error::DuplicateName(_))
        ));
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn strips_ports() {
        assert_eq!(strip_port("example.com:80"), "example.com");
        assert_eq!(strip_port("[::1]:8080"), "::1");
        assert_eq!(strip_port("localhost"), "localhost");
    }
}
