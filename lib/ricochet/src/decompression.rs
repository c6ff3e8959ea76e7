//! Transparent response decompression.
//!
//! When the caller did not pick an `Accept-Encoding` itself, the layer
//! advertises the encodings it can undo and decompresses the response body.
//! The `Content-Encoding` header is then removed and the response is flagged
//! with [`Response::is_decompressed`]. A caller that sets `Accept-Encoding`
//! gets the raw bytes back untouched.

use std::future::Future;
use std::io::Read;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH};
use http::{HeaderMap, HeaderValue};
use tower::{Layer, Service};
use tracing::debug;

use crate::{Error, Request, Response, Result};

#[cfg(feature = "decompression")]
const ACCEPTED: &str = "gzip, deflate, br, zstd";
#[cfg(not(feature = "decompression"))]
const ACCEPTED: &str = "gzip, deflate";

/// Layer that enables automatic response decompression.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecompressionLayer {
    _private: (),
}

impl DecompressionLayer {
    /// Create a new decompression layer.
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl<S> Layer<S> for DecompressionLayer {
    type Service = Decompression<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Decompression { inner }
    }
}

/// Service that decompresses responses it asked to be compressed.
#[derive(Debug, Clone)]
pub struct Decompression<S> {
    inner: S,
}

fn inflate(mut reader: impl Read, encoding: &str) -> Result<Bytes> {
    let mut decompressed = Vec::new();
    reader
        .read_to_end(&mut decompressed)
        .map_err(|e| Error::decode(format!("{encoding} decompression failed: {e}")))?;
    Ok(Bytes::from(decompressed))
}

/// Decompress bytes based on encoding. Unknown encodings are returned as-is.
fn decompress(encoding: &str, body: Bytes) -> Result<(Bytes, bool)> {
    let decoded = match encoding {
        "gzip" | "x-gzip" => inflate(flate2::read::GzDecoder::new(body.as_ref()), encoding)?,
        "deflate" => inflate(flate2::read::ZlibDecoder::new(body.as_ref()), encoding)?,
        #[cfg(feature = "decompression")]
        "br" => inflate(brotli::Decompressor::new(body.as_ref(), 4096), encoding)?,
        #[cfg(feature = "decompression")]
        "zstd" => zstd::decode_all(body.as_ref())
            .map(Bytes::from)
            .map_err(|e| Error::decode(format!("zstd decompression failed: {e}")))?,
        _ => return Ok((body, false)),
    };
    Ok((decoded, true))
}

fn content_encoding(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

impl<S> Service<Request> for Decompression<S>
where
    S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let transparent = !request.headers().contains_key(ACCEPT_ENCODING);
        if transparent {
            request
                .headers_mut()
                .insert(ACCEPT_ENCODING, HeaderValue::from_static(ACCEPTED));
        }

        let head = request.method().is_head();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = inner.call(request).await?;

            let encoding = content_encoding(response.headers());
            if !transparent
                || head
                || !has_content(&response)
                || encoding.is_empty()
                || encoding == "identity"
            {
                return Ok(response);
            }

            let body = response.body_mut().bytes()?;
            match decompress(&encoding, body.clone()) {
                Ok((decoded, changed)) => Ok(rebuild(response, decoded, changed)),
                // error statuses keep their raw body so the status still surfaces
                Err(err) if response.status() >= 300 => {
                    debug!(
                        status = response.status(),
                        error = %err,
                        "keeping undecodable error body"
                    );
                    Ok(rebuild(response, body, false))
                }
                Err(err) => Err(err),
            }
        })
    }
}

/// Responses that can carry an encoded body.
fn has_content(response: &Response) -> bool {
    !matches!(response.status(), 204 | 304) && !response.body().is_empty()
}

fn rebuild(response: Response, body: Bytes, decompressed: bool) -> Response {
    let status = response.status();
    let url = response.url().cloned();
    let mut headers = response.headers().clone();
    if decompressed {
        headers.remove(CONTENT_ENCODING);
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    }

    let rebuilt = Response::new(status, headers, body).with_decompressed(decompressed);
    match url {
        Some(url) => rebuilt.with_url(url),
        None => rebuilt,
    }
}
