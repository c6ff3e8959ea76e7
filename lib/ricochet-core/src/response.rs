//! HTTP response handling.
//!
//! A [`Response`] owns a single-use [`Body`]. Whoever holds the response owns
//! the body: the engine drains it when a decoder is configured, otherwise the
//! caller reads it. Once read or drained, every further read reports
//! [`Error::BodyClosed`].
//!
//! # Example
//!
//! ```ignore
//! let mut response = client.get("/ping").send().await?;
//! let text = response.body_mut().text()?;
//! ```

use bytes::Bytes;
use http::HeaderMap;
use url::Url;

use crate::{Error, Result};

/// Single-owner response body.
#[derive(Debug, Default)]
pub struct Body {
    data: Option<Bytes>,
}

impl Body {
    /// Creates an open body holding the given bytes.
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: Some(data.into()),
        }
    }

    /// Creates a body that has already been consumed.
    #[must_use]
    pub const fn closed() -> Self {
        Self { data: None }
    }

    /// Returns `true` once the body has been read or drained.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.data.is_none()
    }

    /// Returns `true` if the body is still open and holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.as_ref().is_some_and(Bytes::is_empty)
    }

    /// Take the body bytes, closing the body.
    pub fn bytes(&mut self) -> Result<Bytes> {
        self.data.take().ok_or(Error::BodyClosed)
    }

    /// Take the body as UTF-8 text, closing the body.
    pub fn text(&mut self) -> Result<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::decode(format!("response body is not valid UTF-8: {e}")))
    }

    /// Take the body and parse it as JSON, closing the body.
    ///
    /// Unlike a configured decoder, this does not check the content type.
    pub fn json<T: serde::de::DeserializeOwned>(&mut self) -> Result<T> {
        let bytes = self.bytes()?;
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| Error::decode(format!("failed to decode: {e}")))?;
        crate::decode_value(value)
    }

    /// Discard the remaining bytes and close the body.
    ///
    /// Returns the number of bytes discarded.
    pub fn drain(&mut self) -> usize {
        self.data.take().map_or(0, |data| data.len())
    }
}

/// HTTP response with status, headers, final URL and body.
#[derive(Debug)]
pub struct Response {
    status: u16,
    headers: HeaderMap,
    url: Option<Url>,
    body: Body,
    decompressed: bool,
}

impl Response {
    /// Creates a new response.
    #[must_use]
    pub fn new(status: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            url: None,
            body: Body::new(body),
            decompressed: false,
        }
    }

    /// Records the URL this response was served from.
    #[must_use]
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Marks the body as transparently decompressed by the transport.
    #[must_use]
    pub fn with_decompressed(mut self, decompressed: bool) -> Self {
        self.decompressed = decompressed;
        self
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Single header value by name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `Content-Type` header, or an empty string.
    #[must_use]
    pub fn content_type(&self) -> &str {
        self.header(http::header::CONTENT_TYPE.as_str())
            .unwrap_or_default()
    }

    /// URL the response was served from, after any redirects.
    #[must_use]
    pub const fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// `true` if the transport removed a `Content-Encoding` from the body.
    #[must_use]
    pub const fn is_decompressed(&self) -> bool {
        self.decompressed
    }

    /// Response body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Mutable access to the body, for reading it.
    #[must_use]
    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// Consume into body.
    #[must_use]
    pub fn into_body(self) -> Body {
        self.body
    }

    /// Status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Status is 3xx.
    #[must_use]
    pub const fn is_redirection(&self) -> bool {
        self.status >= 300 && self.status < 400
    }

    /// Status is 4xx.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    /// Status is 5xx.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }
}
