//! Error types for ricochet.
//!
//! Every failure a call can produce is a variant of [`Error`]. The variants
//! fall in three groups:
//!
//! - setup-time mistakes ([`Error::Config`]), raised by the client builder
//!   and never seen once a client exists,
//! - per-call failures that never reached a stable HTTP exchange (build,
//!   encode, transport, redirect exhaustion, cancellation),
//! - [`Error::Http`], which carries the complete response of an exchange that
//!   ended with a status of 300 or above.

use derive_more::{Display, Error, From};

use crate::HttpError;

/// Main error type for ricochet operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// Invalid client configuration (bad base URL, invalid retry tuning, ...).
    #[display("configuration error: {_0}")]
    #[from(skip)]
    Config(#[error(not(source))] String),

    /// URL parsing or resolution error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),

    /// The request could not be built (missing template parameter,
    /// querystring collision, missing codec, ...).
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// The request body could not be encoded.
    #[display("failed to encode request body: {_0}")]
    #[from(skip)]
    Encode(#[error(not(source))] String),

    /// A successful response body could not be decoded.
    #[display("{_0}")]
    #[from(skip)]
    Decode(#[error(not(source))] String),

    /// A captured HTTP error body could not be decoded.
    #[display("failed to decode HTTP {status} error body: {message}")]
    #[from(skip)]
    ErrorBodyDecode {
        /// Status of the response the body belongs to.
        status: u16,
        /// Decoder message.
        message: String,
    },

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// The per-attempt deadline elapsed.
    #[display("request timeout: deadline exceeded")]
    #[from(skip)]
    Timeout,

    /// The exchange completed with a status of 300 or above.
    #[display("{_0}")]
    #[from]
    Http(#[error(not(source))] HttpError),

    /// The redirect chain never reached a stable endpoint.
    #[display("too many redirects: stopped after {max} redirects")]
    #[from(skip)]
    TooManyRedirects {
        /// Maximum number of requests per redirect chain.
        max: usize,
    },

    /// The caller cancelled the call.
    #[display("request cancelled")]
    #[from(skip)]
    Cancelled,

    /// The response body was already consumed.
    #[display("read on closed response body")]
    #[from(skip)]
    BodyClosed,
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an encode error.
    #[must_use]
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode(message.into())
    }

    /// Create a decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns `true` if the caller cancelled the call.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns `true` for any HTTP status error, whatever the status.
    #[must_use]
    pub const fn is_http(&self) -> bool {
        matches!(self, Self::Http(_))
    }

    /// Returns `true` if this error happened below HTTP (connection, TLS, deadline).
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Tls(_) | Self::Timeout)
    }

    /// Default retry classification: transport failures and 5xx responses.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.is_transport() || self.is_server_error()
    }

    /// Borrow the HTTP status error, if this is one.
    #[must_use]
    pub const fn as_http(&self) -> Option<&HttpError> {
        match self {
            Self::Http(err) => Some(err),
            _ => None,
        }
    }

    /// Mutably borrow the HTTP status error, if this is one.
    #[must_use]
    pub fn as_http_mut(&mut self) -> Option<&mut HttpError> {
        match self {
            Self::Http(err) => Some(err),
            _ => None,
        }
    }

    /// Convert into the HTTP status error, if this is one.
    #[must_use]
    pub fn into_http(self) -> Option<HttpError> {
        match self {
            Self::Http(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the HTTP status code if this is an HTTP error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.as_http().map(HttpError::status)
    }

    /// Returns `true` if this is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// Returns `true` if this is a server error (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| s >= 500)
    }
}
