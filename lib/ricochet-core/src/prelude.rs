//! Prelude module for convenient imports.
//!
//! ```ignore
//! use ricochet_core::prelude::*;
//! ```

pub use crate::{
    Backoff, Decoder, Encoder, Error, HttpError, JsonDecoder, JsonEncoder, Method, Observer,
    Request, Response, Result, RetryDecision, RetryStrategy, UrlModifier,
};
