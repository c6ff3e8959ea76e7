//! HTTP request-execution engine.
//!
//! Build a [`Client`] once with its defaults (base URL, headers, codecs,
//! timeout, redirect and retry policies), then issue calls through it. Every
//! call resolves its URL, encodes its body once, and runs through a retry loop
//! around a redirect chain around the transport. Responses with a status of
//! 300 or above come back as [`Error::Http`], still carrying the response.
//!
//! # Example
//!
//! ```ignore
//! use ricochet::prelude::*;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Item {
//!     name: String,
//! }
//!
//! let client = Client::builder()
//!     .base_url("https://api.example.com/")
//!     .encode_json()
//!     .decode_json()
//!     .retry_on_error()
//!     .build()?;
//!
//! let item = Item { name: "widget".into() };
//! let (_, created): (_, Item) = client.post("items").body(&item).fetch().await?;
//!
//! match client.get("items/:id").param("id", "missing").send().await {
//!     Err(Error::Http(err)) if err.status() == 404 => {}
//!     other => println!("{other:?}"),
//! }
//! ```
//!
//! # Features
//!
//! - `decompression` (default): `br` and `zstd` response decoding
//! - `metrics`: [`MetricsObserver`] recording request metrics

mod call;
mod client;
mod config;
mod connector;
mod decompression;
mod engine;
#[cfg(feature = "metrics")]
mod metrics;
pub mod prelude;
mod redirect;
mod transport;

pub use call::Call;
pub use client::{Client, ClientBuilder};
pub use config::{
    ClientConfig, DEFAULT_TIMEOUT, MAX_REDIRECTS, RedirectPolicy, TransportConfig,
    TransportConfigBuilder,
};
pub use decompression::{Decompression, DecompressionLayer};
#[cfg(feature = "metrics")]
pub use metrics::MetricsObserver;
pub use transport::{BoxedTransport, HyperTransport, TransportFuture};

// Re-export tower for transport layers and custom transports
pub use tower;

// Cancellation tokens accepted by `Call::cancel_on`
pub use tokio_util::sync::CancellationToken;

// Re-export core types
pub use ricochet_core::{
    AttemptOutcome, Backoff, Body, BodyOpener, Completion, ContentType, Decoder, Encoder, Error,
    FormEncoder, GZIP_MIN_SIZE, GzipEncoder, HttpError, JsonDecoder, JsonEncoder, Method,
    Observer, Request, RequestBuilder, RequestEncoding, RequestInfo, Response, Result,
    RetryDecision, RetryPolicy, RetryStrategy, UrlModifier, decode_value, to_value,
};

// Re-export http and url types used throughout the API
pub use ricochet_core::{HeaderMap, HeaderName, HeaderValue, StatusCode, Url, header};
