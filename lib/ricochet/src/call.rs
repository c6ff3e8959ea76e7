//! Per-call request builder.

use std::collections::BTreeMap;
use std::fmt;

use http::header::CONTENT_LENGTH;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::client::{Client, parse_call_header};
use crate::engine::{self, Outgoing};
use crate::{Error, HeaderMap, HeaderValue, Method, Response, Result, UrlModifier, decode_value};

/// One request being prepared against a [`Client`].
///
/// Created by the client's verb methods; finished with [`Call::send`] or
/// [`Call::fetch`]. Builder errors (a body that cannot be serialized, an
/// invalid header) are kept and returned when the call is sent.
///
/// ```ignore
/// let (_, profile): (_, Profile) = client
///     .get("/user/:user-id/profile")
///     .param("user-id", "glenjamin")
///     .query([("expand", "teams")])
///     .fetch()
///     .await?;
/// ```
#[must_use = "a call does nothing until it is sent"]
pub struct Call {
    client: Client,
    method: Method,
    target: String,
    modifiers: Vec<UrlModifier>,
    headers: HeaderMap,
    body: Option<Value>,
    cancel: Option<CancellationToken>,
    error: Option<Error>,
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("method", &self.method)
            .field("target", &self.target)
            .field("modifiers", &self.modifiers.len())
            .field("headers", &self.headers)
            .field("body", &self.body.is_some())
            .field("cancellable", &self.cancel.is_some())
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl Call {
    pub(crate) fn new(client: Client, method: Method, target: String) -> Self {
        Self {
            client,
            method,
            target,
            modifiers: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            cancel: None,
            error: None,
        }
    }

    fn fail(mut self, error: Error) -> Self {
        self.error.get_or_insert(error);
        self
    }

    /// Replace the first `:name` token of the path with the escaped value.
    pub fn param(self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.modify(UrlModifier::param(name, value))
    }

    /// Replace the first `:name` token of the path with an integer.
    pub fn int_param(self, name: impl Into<String>, value: i64) -> Self {
        self.modify(UrlModifier::int_param(name, value))
    }

    /// Set the querystring from ordered pairs.
    pub fn query<K, V>(self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.modify(UrlModifier::query(pairs))
    }

    /// Set the querystring from a multi-valued map.
    pub fn query_map<K, V>(self, values: &BTreeMap<K, Vec<V>>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.modify(UrlModifier::query_map(values))
    }

    /// Set the querystring from a serializable struct.
    pub fn query_struct<T: Serialize + ?Sized>(self, value: &T) -> Self {
        self.modify(UrlModifier::query_struct(value))
    }

    /// Apply any URL modifier. Modifiers run in the order they were added.
    pub fn modify(mut self, modifier: UrlModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Set a header for this call only, overriding the client default.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match parse_call_header(name, value) {
            Ok((name, value)) => {
                self.headers.insert(name, value);
                self
            }
            Err(err) => self.fail(err),
        }
    }

    /// Send a body through the client's encoder.
    ///
    /// A value serializing to `null` (like `None`) sends no body at all.
    pub fn body<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        match crate::to_value(body) {
            Ok(Value::Null) => {
                self.body = None;
                self
            }
            Ok(value) => {
                self.body = Some(value);
                self
            }
            Err(err) => self.fail(err),
        }
    }

    /// Abort the call, including retry waits, when `token` is cancelled.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn resolve(&self) -> Result<Url> {
        let mut url = match self.client.config().base_url() {
            Some(base) => base.join(&self.target)?,
            None => Url::parse(&self.target)?,
        };
        for modifier in &self.modifiers {
            modifier.apply(&mut url)?;
        }
        Ok(url)
    }

    fn prepare(&mut self) -> Result<Outgoing> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }

        let url = self.resolve()?;
        let config = self.client.config();

        let mut headers = config.headers().clone();
        for (name, value) in &self.headers {
            headers.insert(name, value.clone());
        }

        let encoding = match self.body.take() {
            Some(value) => {
                let encoder = config.encoder.as_ref().ok_or_else(|| {
                    Error::invalid_request("input requested but no encoder configured")
                })?;
                let encoding = encoder.encode(&value)?;
                for (name, value) in &encoding.headers {
                    headers.insert(name, value.clone());
                }
                headers.insert(CONTENT_LENGTH, HeaderValue::from(encoding.content_length));
                Some(encoding)
            }
            None => None,
        };

        Ok(Outgoing {
            method: self.method,
            url,
            headers,
            encoding,
        })
    }

    async fn execute(mut self) -> Result<Response> {
        let outgoing = self.prepare()?;
        engine::execute(
            self.client.config(),
            self.client.transport(),
            outgoing,
            self.cancel.as_ref(),
        )
        .await
    }

    /// Send the call without decoding the response.
    ///
    /// With a decoder configured the body is drained and closed; without one,
    /// the caller owns it.
    pub async fn send(self) -> Result<Response> {
        let decoding = self.client.config().has_decoder();
        let mut response = self.execute().await?;
        if decoding {
            response.body_mut().drain();
        }
        Ok(response)
    }

    /// Send the call and decode the response body into `T`.
    ///
    /// Requires a decoder. An empty body is a decode error; use
    /// [`Call::fetch_optional`] for endpoints that may answer `204`.
    pub async fn fetch<T: DeserializeOwned>(self) -> Result<(Response, T)> {
        let (response, output) = self.fetch_optional().await?;
        let output = output.ok_or_else(|| Error::decode("unexpected empty response"))?;
        Ok((response, output))
    }

    /// Like [`Call::fetch`], but an empty body decodes to `None`.
    pub async fn fetch_optional<T: DeserializeOwned>(self) -> Result<(Response, Option<T>)> {
        let decoder = self.client.config().decoder.clone().ok_or_else(|| {
            Error::invalid_request("output requested but no decoder configured")
        })?;

        let mut response = self.execute().await?;
        let body = response.body_mut().bytes()?;
        if body.is_empty() {
            return Ok((response, None));
        }

        let value = decoder.decode(response.content_type(), &body)?;
        let output = decode_value::<T>(value)?;
        Ok((response, Some(output)))
    }
}
