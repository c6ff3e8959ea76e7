//! Prelude module for convenient imports.
//!
//! ```ignore
//! use ricochet::prelude::*;
//! ```

pub use crate::{
    Backoff, CancellationToken, Client, ClientBuilder, Decoder, Encoder, Error, HttpError,
    Method, Observer, RedirectPolicy, Response, Result, RetryDecision, RetryStrategy,
    UrlModifier,
};
pub use serde::{Deserialize, Serialize};
