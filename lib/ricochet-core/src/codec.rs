//! Request and response body codecs.
//!
//! An [`Encoder`] turns a call's input into a [`RequestEncoding`]: the bytes are
//! serialized exactly once and handed out through a [`BodyOpener`], so every
//! physical attempt (retries and redirects included) gets a fresh copy.
//!
//! A [`Decoder`] checks the response media type before parsing. A mismatching
//! content type is always an error, so an HTML error page is never mistaken
//! for data.
//!
//! Codecs work on [`serde_json::Value`] as their neutral data model. That keeps
//! both traits object-safe, so a client can hold any encoder or decoder behind
//! an `Arc`.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use flate2::{Compression, write::GzEncoder};
use http::{HeaderMap, HeaderValue, header};
use serde_json::Value;

use crate::{Error, Result};

/// Bodies smaller than this are sent uncompressed by [`GzipEncoder`].
pub const GZIP_MIN_SIZE: usize = 1024;

/// Content type for request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// JSON content type (`application/json`).
    Json,
    /// Form URL-encoded content type (`application/x-www-form-urlencoded`).
    FormUrlEncoded,
}

impl ContentType {
    /// Get the MIME type string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::FormUrlEncoded => "application/x-www-form-urlencoded",
        }
    }

    /// Header value sent with encoded bodies of this type.
    #[must_use]
    pub const fn header_value(&self) -> HeaderValue {
        match self {
            Self::Json => HeaderValue::from_static("application/json; charset=utf-8"),
            Self::FormUrlEncoded => HeaderValue::from_static("application/x-www-form-urlencoded"),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Idempotent source of request body bytes.
///
/// Each call to [`BodyOpener::open`] yields an independent, unconsumed copy
/// of the same bytes.
#[derive(Clone)]
pub struct BodyOpener(Arc<dyn Fn() -> Result<Bytes> + Send + Sync>);

impl BodyOpener {
    /// Wrap an opener function.
    pub fn new(open: impl Fn() -> Result<Bytes> + Send + Sync + 'static) -> Self {
        Self(Arc::new(open))
    }

    /// Opener that always yields the given bytes.
    #[must_use]
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self::new(move || Ok(bytes.clone()))
    }

    /// Produce a fresh copy of the body.
    pub fn open(&self) -> Result<Bytes> {
        (self.0)()
    }
}

impl fmt::Debug for BodyOpener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BodyOpener").finish_non_exhaustive()
    }
}

/// Result of encoding a request body.
#[derive(Debug, Clone)]
pub struct RequestEncoding {
    /// Length of the bytes produced by `opener`.
    pub content_length: u64,
    /// Headers merged into the request, replacing existing values.
    pub headers: HeaderMap,
    /// Source of the body bytes.
    pub opener: BodyOpener,
}

impl RequestEncoding {
    /// Encoding of in-memory bytes with a content type.
    #[must_use]
    pub fn from_bytes(bytes: Bytes, content_type: HeaderValue) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, content_type);
        Self {
            content_length: bytes.len() as u64,
            headers,
            opener: BodyOpener::from_bytes(bytes),
        }
    }

    /// Produce a fresh copy of the body.
    pub fn open(&self) -> Result<Bytes> {
        self.opener.open()
    }
}

/// Serializes call inputs into request bodies.
pub trait Encoder: Send + Sync + 'static {
    /// Encode the input once.
    fn encode(&self, input: &Value) -> Result<RequestEncoding>;
}

/// JSON request bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode(&self, input: &Value) -> Result<RequestEncoding> {
        let bytes = serde_json::to_vec(input).map_err(|e| Error::encode(e.to_string()))?;
        Ok(RequestEncoding::from_bytes(
            Bytes::from(bytes),
            ContentType::Json.header_value(),
        ))
    }
}

/// Form URL-encoded request bodies.
///
/// Arrays become repeated fields (`tags=a&tags=b`).
#[derive(Debug, Clone, Copy, Default)]
pub struct FormEncoder;

impl Encoder for FormEncoder {
    fn encode(&self, input: &Value) -> Result<RequestEncoding> {
        let body = serde_html_form::to_string(input).map_err(|e| Error::encode(e.to_string()))?;
        Ok(RequestEncoding::from_bytes(
            Bytes::from(body.into_bytes()),
            ContentType::FormUrlEncoded.header_value(),
        ))
    }
}

/// Wraps another encoder and gzips bodies of at least `min_size` bytes.
#[derive(Clone)]
pub struct GzipEncoder {
    inner: Arc<dyn Encoder>,
    min_size: usize,
}

impl GzipEncoder {
    /// Compress bodies produced by `inner` from [`GZIP_MIN_SIZE`] bytes.
    #[must_use]
    pub fn new(inner: Arc<dyn Encoder>) -> Self {
        Self {
            inner,
            min_size: GZIP_MIN_SIZE,
        }
    }

    /// Change the compression threshold.
    #[must_use]
    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }
}

impl fmt::Debug for GzipEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GzipEncoder")
            .field("min_size", &self.min_size)
            .finish_non_exhaustive()
    }
}

impl Encoder for GzipEncoder {
    fn encode(&self, input: &Value) -> Result<RequestEncoding> {
        let mut encoding = self.inner.encode(input)?;
        if encoding.content_length < self.min_size as u64 {
            return Ok(encoding);
        }

        let raw = encoding.open()?;
        let mut gzip = GzEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
        gzip.write_all(&raw)
            .map_err(|e| Error::encode(format!("gzip compression failed: {e}")))?;
        let compressed = gzip
            .finish()
            .map(Bytes::from)
            .map_err(|e| Error::encode(format!("gzip compression failed: {e}")))?;

        encoding.content_length = compressed.len() as u64;
        encoding
            .headers
            .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        encoding.opener = BodyOpener::from_bytes(compressed);
        Ok(encoding)
    }
}

/// Convert a serializable input into the codec data model.
pub fn to_value<T: serde::Serialize + ?Sized>(input: &T) -> Result<Value> {
    serde_json::to_value(input).map_err(|e| Error::encode(e.to_string()))
}

// ============================================================================
// Decoding
// ============================================================================

/// Parses response bodies.
pub trait Decoder: Send + Sync + 'static {
    /// `Accept` header advertised while this decoder is installed.
    fn accept(&self) -> Option<HeaderValue> {
        None
    }

    /// Validate the content type and parse the body.
    fn decode(&self, content_type: &str, body: &[u8]) -> Result<Value>;
}

/// JSON response bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl JsonDecoder {
    /// `true` for `application/json` and `application/*+json` media types.
    #[must_use]
    pub fn accepts(content_type: &str) -> bool {
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        media_type == ContentType::Json.as_str()
            || (media_type.starts_with("application/") && media_type.ends_with("+json"))
    }
}

impl Decoder for JsonDecoder {
    fn accept(&self) -> Option<HeaderValue> {
        Some(HeaderValue::from_static(ContentType::Json.as_str()))
    }

    fn decode(&self, content_type: &str, body: &[u8]) -> Result<Value> {
        if !Self::accepts(content_type) {
            return Err(Error::decode(format!(
                "expected JSON content-type, got {content_type:?}"
            )));
        }
        serde_json::from_slice(body).map_err(|e| Error::decode(format!("failed to decode: {e}")))
    }
}

/// Deserialize a decoded value with path-aware error messages.
///
/// Uses `serde_path_to_error` so a failure names the field that did not
/// match (e.g. `user.address.city`).
pub fn decode_value<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_path_to_error::deserialize(value).map_err(|e| {
        let path = e.path().to_string();
        if path == "." {
            Error::decode(format!("failed to decode: {}", e.inner()))
        } else {
            Error::decode(format!("failed to decode at '{path}': {}", e.inner()))
        }
    })
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;

    #[test]
    fn content_type_as_str() {
        assert_eq!(ContentType::Json.as_str(), "application/json");
        assert_eq!(
            ContentType::FormUrlEncoded.to_string(),
            "application/x-www-form-urlencoded"
        );
    }

    #[test]
    fn json_encoder_sets_content_type_and_length() {
        let encoding = JsonEncoder.encode(&json!({"a": 1})).expect("encode");

        assert_eq!(encoding.content_length, 7);
        assert_eq!(
            encoding.headers.get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("application/json; charset=utf-8"))
        );
        assert_eq!(encoding.open().expect("open").as_ref(), br#"{"a":1}"#);
    }

    #[test]
    fn opener_yields_fresh_copies() {
        let encoding = JsonEncoder.encode(&json!(["x", "y"])).expect("encode");

        let first = encoding.open().expect("first");
        let second = encoding.open().expect("second");
        assert_eq!(first, second);
        assert_eq!(first.len() as u64, encoding.content_length);
    }

    #[test]
    fn form_encoder_repeats_array_fields() {
        let encoding = FormEncoder
            .encode(&json!({"name": "test", "tags": ["a", "b"]}))
            .expect("encode");
        let body = encoding.open().expect("open");
        let body = std::str::from_utf8(&body).expect("utf8");

        assert!(body.contains("name=test"));
        assert!(body.contains("tags=a"));
        assert!(body.contains("tags=b"));
    }

    #[test]
    fn gzip_skips_small_bodies() {
        let encoder = GzipEncoder::new(Arc::new(JsonEncoder));
        let encoding = encoder.encode(&json!({"small": true})).expect("encode");

        assert!(encoding.headers.get(header::CONTENT_ENCODING).is_none());
        assert_eq!(encoding.open().expect("open").as_ref(), br#"{"small":true}"#);
    }

    #[test]
    fn gzip_compresses_large_bodies() {
        let input = json!(vec!["abc"; 300]);
        let encoder = GzipEncoder::new(Arc::new(JsonEncoder));
        let encoding = encoder.encode(&input).expect("encode");

        assert_eq!(
            encoding.headers.get(header::CONTENT_ENCODING),
            Some(&HeaderValue::from_static("gzip"))
        );
        assert!(encoding.content_length < 100);
        assert!(encoding.headers.get(header::CONTENT_TYPE).is_some());

        let compressed = encoding.open().expect("open");
        let mut decoded = String::new();
        flate2::read::GzDecoder::new(compressed.as_ref())
            .read_to_string(&mut decoded)
            .expect("gunzip");
        let round: Value = serde_json::from_str(&decoded).expect("json");
        assert_eq!(round, input);
    }

    #[test]
    fn json_decoder_checks_media_type() {
        assert!(JsonDecoder::accepts("application/json"));
        assert!(JsonDecoder::accepts("application/json; charset=utf-8"));
        assert!(JsonDecoder::accepts("Application/Problem+JSON"));
        assert!(!JsonDecoder::accepts("text/html"));
        assert!(!JsonDecoder::accepts(""));

        let err = JsonDecoder
            .decode("text/html", b"<html></html>")
            .expect_err("html is not json");
        assert!(err.to_string().contains("expected JSON content-type"));
    }

    #[test]
    fn json_decoder_reports_syntax_errors() {
        let err = JsonDecoder
            .decode("application/json", br#"{"error": }"#)
            .expect_err("invalid json");
        assert!(err.to_string().starts_with("failed to decode"));
    }

    #[test]
    fn from_value_names_the_failing_path() {
        #[derive(Debug, Deserialize)]
        struct Address {
            #[allow(dead_code)]
            city: String,
        }

        #[derive(Debug, Deserialize)]
        struct User {
            #[allow(dead_code)]
            address: Address,
        }

        let err = decode_value::<User>(json!({"address": {}})).expect_err("missing city");
        let msg = err.to_string();
        assert!(msg.contains("address"), "expected path in: {msg}");
        assert!(msg.contains("city"), "expected field in: {msg}");
    }

    #[test]
    fn value_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Item {
            id: u64,
            name: String,
        }

        let item = Item {
            id: 42,
            name: "widget".to_string(),
        };
        let value = to_value(&item).expect("to value");
        assert_eq!(decode_value::<Item>(value).expect("from value"), item);
    }
}
