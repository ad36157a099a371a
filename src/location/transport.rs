// src/location/transport.rs
use crate::errors::Error;
use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Request, Response};
use hyper_tls::HttpsConnector;
use std::time::Duration;

/// Sends a fully prepared request to a backend.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, req: Request<Body>) -> Result<Response<Body>, Error>;
}

/// hyper client over plain HTTP or HTTPS.
///
/// `timeout` bounds the wait for response headers; streaming the body back
/// to the caller is not limited by it.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(connect_timeout: Option<Duration>, timeout: Option<Duration>) -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(connect_timeout);

        let client = Client::builder().build(HttpsConnector::new_with_connector(http));
        Self { client, timeout }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(5)), Some(Duration::from_secs(30)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, req: Request<Body>) -> Result<Response<Body>, Error> {
        let call = self.client.request(req);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| Error::Timeout(limit))?
                .map_err(Error::from),
            None => call.await.map_err(Error::from),
        }
    }
}
