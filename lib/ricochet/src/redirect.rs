//! Redirect handling.
//!
//! The engine follows redirects itself, hop by hop, so every hop is a physical
//! request: observed, logged and bounded by the attempt deadline.

use http::header::{
    AUTHORIZATION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, LOCATION,
};
use url::Url;

use crate::engine::Outgoing;
use crate::{Error, Response, Result};

/// Check if a status code is a redirect the engine follows.
pub(crate) const fn is_followed(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Resolve the `Location` of a redirect response against the request URL.
///
/// Returns `None` when the response carries no usable `Location` header.
pub(crate) fn location(response: &Response, current: &Url) -> Option<Result<Url>> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    Some(resolve_redirect_url(current, location))
}

/// Resolve a redirect Location URL relative to the original request URL.
fn resolve_redirect_url(base_url: &Url, location: &str) -> Result<Url> {
    base_url.join(location).map_err(Error::InvalidUrl)
}

/// The request to send after a redirect with the given status.
///
/// 307 and 308 resend the method and body as-is. The other statuses switch to
/// GET (HEAD stays HEAD) and drop the body with its headers. Credentials are
/// dropped when the redirect leaves the host.
pub(crate) fn follow(current: &Outgoing, status: u16, target: Url) -> Outgoing {
    let method = current.method.after_redirect(status);
    let mut headers = current.headers.clone();

    let encoding = if matches!(status, 307 | 308) {
        current.encoding.clone()
    } else {
        for name in [CONTENT_TYPE, CONTENT_LENGTH, CONTENT_ENCODING] {
            headers.remove(name);
        }
        None
    };

    if current.url.host_str() != target.host_str() {
        headers.remove(AUTHORIZATION);
        headers.remove(COOKIE);
    }

    Outgoing {
        method,
        url: target,
        headers,
        encoding,
    }
}
