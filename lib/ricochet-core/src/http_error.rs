//! Structured error for responses with a status of 300 or above.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::{Decoder, Error, Response, Result, decode_value};

/// A completed exchange whose status was 300 or above.
///
/// The full [`Response`] stays available for inspection. When the client has a
/// decoder, the body is captured into memory as soon as the error is built:
/// [`HttpError::decode`] then works any number of times without touching the
/// network, and the response's own body reports closed.
pub struct HttpError {
    response: Response,
    captured: Option<Bytes>,
    decoder: Option<Arc<dyn Decoder>>,
}

impl HttpError {
    /// Wrap a response without capturing its body.
    #[must_use]
    pub const fn new(response: Response) -> Self {
        Self {
            response,
            captured: None,
            decoder: None,
        }
    }

    /// Wrap a response, draining its body into memory for `decoder`.
    pub fn capture(mut response: Response, decoder: Arc<dyn Decoder>) -> Result<Self> {
        let captured = response.body_mut().bytes()?;
        Ok(Self {
            response,
            captured: Some(captured),
            decoder: Some(decoder),
        })
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.response.status()
    }

    /// The response that produced this error.
    #[must_use]
    pub const fn response(&self) -> &Response {
        &self.response
    }

    /// Mutable access to the response, to read an uncaptured body.
    #[must_use]
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Consume into the response.
    #[must_use]
    pub fn into_response(self) -> Response {
        self.response
    }

    /// Captured body bytes, if a decoder was configured.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.captured.as_ref()
    }

    /// Captured body as lossy UTF-8 text.
    #[must_use]
    pub fn body_text(&self) -> Option<String> {
        self.captured
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Decode the captured body with the configured decoder.
    ///
    /// Can be called repeatedly; every call sees the same bytes.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let status = self.status();
        let fail = |message: String| Error::ErrorBodyDecode { status, message };

        let (Some(bytes), Some(decoder)) = (&self.captured, &self.decoder) else {
            return Err(fail("no decoder configured".to_string()));
        };
        if bytes.is_empty() {
            return Err(fail("unexpected empty response".to_string()));
        }

        decoder
            .decode(self.response.content_type(), bytes)
            .and_then(decode_value::<T>)
            .map_err(|err| fail(err.to_string()))
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP Status {}", self.status())
    }
}

impl fmt::Debug for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpError")
            .field("status", &self.status())
            .field("url", &self.response.url().map(url::Url::as_str))
            .field("captured", &self.captured.as_ref().map(Bytes::len))
            .finish_non_exhaustive()
    }
}

impl std::error::Error for HttpError {}
