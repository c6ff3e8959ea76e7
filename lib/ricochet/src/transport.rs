//! Default transport built on hyper-util's pooled client.
//!
//! The transport sends exactly one request: it never follows redirects and
//! never retries, so the engine stays in control of both. Response bodies are
//! collected into memory before the response is returned.

use std::error::Error as _;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tower::util::BoxCloneService;
use tower::{Layer, ServiceExt};
use tower_service::Service;

use crate::{
    Error, Request, Response, Result, TransportConfig, connector::https_connector,
    decompression::DecompressionLayer,
};

/// Type-erased transport service.
pub type BoxedTransport = BoxCloneService<Request, Response, Error>;

/// Future type for transport implementations.
pub type TransportFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send + 'static>>;

/// Thread-safe handle on a [`BoxedTransport`], shared by derived clients.
#[derive(Clone)]
pub(crate) struct SharedTransport {
    inner: Arc<Mutex<BoxedTransport>>,
}

impl SharedTransport {
    pub(crate) fn new(service: BoxedTransport) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    /// Clone the underlying service out of the lock.
    pub(crate) fn service(&self) -> BoxedTransport {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub(crate) async fn send(&self, request: Request) -> Result<Response> {
        let mut service = self.service();
        service.ready().await?.call(request).await
    }
}

impl std::fmt::Debug for SharedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedTransport").finish_non_exhaustive()
    }
}

/// HTTP transport using hyper-util, with connection pooling and rustls.
#[derive(Clone)]
pub struct HyperTransport {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport").finish_non_exhaustive()
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new(&TransportConfig::default())
    }
}

impl HyperTransport {
    /// Create a transport with the given connection settings.
    #[must_use]
    pub fn new(config: &TransportConfig) -> Self {
        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .build(https_connector(config));

        Self { inner }
    }

    /// The default transport stack: hyper with transparent decompression.
    #[must_use]
    pub fn boxed(config: &TransportConfig) -> BoxedTransport {
        BoxCloneService::new(DecompressionLayer::new().layer(Self::new(config)))
    }

    fn build_hyper_request(request: Request) -> Result<http::Request<Full<Bytes>>> {
        let (method, url, headers, body) = request.into_parts();

        let mut hyper_request = http::Request::builder()
            .method(http::Method::from(method))
            .uri(url.as_str())
            .body(body.map_or_else(Full::default, Full::new))
            .map_err(|e| Error::invalid_request(e.to_string()))?;
        *hyper_request.headers_mut() = headers;

        Ok(hyper_request)
    }

    async fn execute(&self, request: Request) -> Result<Response> {
        let url = request.url().clone();
        let hyper_request = Self::build_hyper_request(request)?;

        let response = self
            .inner
            .request(hyper_request)
            .await
            .map_err(Self::map_hyper_error)?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| Error::connection(e.to_string()))?
            .to_bytes();

        Ok(Response::new(parts.status.as_u16(), parts.headers, body).with_url(url))
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        let mut msg = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            msg = format!("{msg}: {cause}");
            source = cause.source();
        }

        let lower = msg.to_ascii_lowercase();
        if lower.contains("ssl") || lower.contains("tls") || lower.contains("certificate") {
            return Error::tls(msg);
        }

        Error::connection(msg)
    }
}

impl Service<Request> for HyperTransport {
    type Response = Response;
    type Error = Error;
    type Future = TransportFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let transport = self.clone();
        Box::pin(async move { transport.execute(request).await })
    }
}

#[cfg(test)]
mod tests {
    use ricochet_core::{HeaderValue, Method, Url, header};

    use super::*;

    #[test]
    fn hyper_request_keeps_method_url_headers_and_body() {
        let url = Url::parse("http://localhost:8080/items?x=1").expect("url");
        let request = Request::builder(Method::Put, url)
            .header(header::ACCEPT, HeaderValue::from_static("application/json"))
            .body(Bytes::from_static(b"{}"))
            .build();

        let hyper_request = HyperTransport::build_hyper_request(request).expect("build");
        assert_eq!(hyper_request.method(), http::Method::PUT);
        assert_eq!(hyper_request.uri(), "http://localhost:8080/items?x=1");
        assert_eq!(
            hyper_request.headers().get(header::ACCEPT),
            Some(&HeaderValue::from_static("application/json"))
        );
    }

    #[test]
    fn transport_is_clone_and_debug() {
        let transport = HyperTransport::default();
        let cloned = transport.clone();
        assert!(format!("{cloned:?}").contains("HyperTransport"));
    }
}
