//! URL modifiers applied to a resolved request URL.
//!
//! Modifiers run in call order, after the target has been resolved against the
//! base URL and before anything is sent. Each one may fail, and a failure
//! aborts the call with [`Error::InvalidRequest`].
//!
//! ```
//! use ricochet_core::{UrlModifier, Url};
//!
//! let mut url = Url::parse("http://x/api/items/:id").unwrap();
//! UrlModifier::param("id", "42 ").apply(&mut url).unwrap();
//! assert_eq!(url.path(), "/api/items/42%20");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use url::Url;

use crate::{Error, Result};

/// Characters escaped when a value is substituted into a path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\')
    .add(b'%');

type ModifyFn = dyn Fn(&mut Url) -> Result<()> + Send + Sync;

/// A fallible transformation of a request URL.
#[derive(Clone)]
pub struct UrlModifier(Arc<ModifyFn>);

impl UrlModifier {
    /// Wrap a custom modifier.
    pub fn new(modify: impl Fn(&mut Url) -> Result<()> + Send + Sync + 'static) -> Self {
        Self(Arc::new(modify))
    }

    /// Apply the modifier to a URL.
    pub fn apply(&self, url: &mut Url) -> Result<()> {
        (self.0)(url)
    }

    /// Set the querystring from name/value pairs, in order.
    ///
    /// Fails when the URL already carries a querystring. No pairs is a no-op.
    pub fn query<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(move |url| {
            if pairs.is_empty() {
                return Ok(());
            }
            ensure_no_query(url)?;
            url.query_pairs_mut().extend_pairs(&pairs);
            Ok(())
        })
    }

    /// Set the querystring from a multi-valued map; keys come out sorted.
    pub fn query_map<K, V>(values: &BTreeMap<K, Vec<V>>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::query(values.iter().flat_map(|(key, vs)| {
            vs.iter()
                .map(move |v| (key.as_ref().to_string(), v.as_ref().to_string()))
        }))
    }

    /// Set the querystring from a serializable struct.
    ///
    /// Sequences become repeated keys (`tag=a&tag=b`).
    pub fn query_struct<T: serde::Serialize + ?Sized>(value: &T) -> Self {
        let encoded = serde_html_form::to_string(value)
            .map_err(|e| format!("failed to encode querystring: {e}"));
        Self::new(move |url| {
            let query = encoded.as_ref().map_err(Error::invalid_request)?;
            if query.is_empty() {
                return Ok(());
            }
            ensure_no_query(url)?;
            url.set_query(Some(query.as_str()));
            Ok(())
        })
    }

    /// Replace the first `:name` token in the path with the escaped value.
    ///
    /// Fails when the token is missing, which usually means a typo.
    pub fn param(name: impl Into<String>, value: impl fmt::Display) -> Self {
        let name = name.into();
        let escaped = utf8_percent_encode(&value.to_string(), PATH_SEGMENT).to_string();
        Self::new(move |url| {
            let token = format!(":{name}");
            if !url.path().contains(&token) {
                return Err(Error::invalid_request(format!(
                    "failed to find parameter {name}"
                )));
            }
            let replaced = url.path().replacen(&token, &escaped, 1);
            url.set_path(&replaced);
            Ok(())
        })
    }

    /// [`UrlModifier::param`] with an integer value.
    pub fn int_param(name: impl Into<String>, value: i64) -> Self {
        Self::param(name, value)
    }
}

impl fmt::Debug for UrlModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UrlModifier").finish_non_exhaustive()
    }
}

fn ensure_no_query(url: &Url) -> Result<()> {
    match url.query() {
        Some(query) if !query.is_empty() => Err(Error::invalid_request(format!(
            "URL already has a querystring: {query}"
        ))),
        _ => Ok(()),
    }
}
