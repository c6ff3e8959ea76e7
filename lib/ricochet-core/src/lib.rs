//! Core types for the ricochet request-execution engine.
//!
//! This crate holds everything that does not need a network:
//! - [`Method`], [`Request`] and [`Response`] - the exchanged values
//! - [`Error`], [`HttpError`] and [`Result`] - error handling
//! - [`Encoder`], [`Decoder`] and the JSON / form / gzip codecs
//! - [`UrlModifier`] - query and path-parameter rewriting
//! - [`RetryPolicy`] and [`Backoff`] - the retry model
//! - [`Observer`] - the per-request hook
//!
//! The engine itself lives in the `ricochet` crate.

mod codec;
mod error;
mod http_error;
mod method;
mod observe;
pub mod prelude;
mod request;
mod response;
mod retry;
mod url_modifier;

pub use codec::{
    BodyOpener, ContentType, Decoder, Encoder, FormEncoder, GZIP_MIN_SIZE, GzipEncoder,
    JsonDecoder, JsonEncoder, RequestEncoding, decode_value, to_value,
};
pub use error::{Error, Result};
pub use http_error::HttpError;
pub use method::Method;
pub use observe::{AttemptOutcome, Completion, Observer, RequestInfo};
pub use request::{Request, RequestBuilder};
pub use response::{Body, Response};
pub use retry::{
    Backoff, RetryDecision, RetryPolicy, RetrySchedule, RetryStrategy, StrategyFactory,
};
pub use url_modifier::UrlModifier;

// Re-export http and url types used throughout the API
pub use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
pub use url::Url;
