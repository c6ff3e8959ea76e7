//! HTTP method types.

use derive_more::Display;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Method {
    /// GET method - retrieve a resource.
    #[display("GET")]
    Get,
    /// HEAD method - retrieve headers only.
    #[display("HEAD")]
    Head,
    /// OPTIONS method - retrieve allowed methods.
    #[display("OPTIONS")]
    Options,
    /// POST method - create a resource.
    #[display("POST")]
    Post,
    /// PUT method - replace a resource.
    #[display("PUT")]
    Put,
    /// PATCH method - partially update a resource.
    #[display("PATCH")]
    Patch,
    /// DELETE method - remove a resource.
    #[display("DELETE")]
    Delete,
}

impl Method {
    /// The method as it appears on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Returns `true` if a response to this method never carries a body.
    #[must_use]
    pub const fn is_head(&self) -> bool {
        matches!(self, Self::Head)
    }

    /// The method to use after following a redirect with the given status.
    ///
    /// 307 and 308 keep the original method. 301, 302 and 303 switch to GET,
    /// except for HEAD which stays HEAD.
    #[must_use]
    pub const fn after_redirect(self, status: u16) -> Self {
        match (status, self) {
            (307 | 308, method) | (_, method @ Self::Head) => method,
            _ => Self::Get,
        }
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Head => Self::HEAD,
            Method::Options => Self::OPTIONS,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Patch => Self::PATCH,
            Method::Delete => Self::DELETE,
        }
    }
}

impl TryFrom<http::Method> for Method {
    type Error = crate::Error;

    fn try_from(method: http::Method) -> Result<Self, Self::Error> {
        match method {
            http::Method::GET => Ok(Self::Get),
            http::Method::HEAD => Ok(Self::Head),
            http::Method::OPTIONS => Ok(Self::Options),
            http::Method::POST => Ok(Self::Post),
            http::Method::PUT => Ok(Self::Put),
            http::Method::PATCH => Ok(Self::Patch),
            http::Method::DELETE => Ok(Self::Delete),
            other => Err(crate::Error::invalid_request(format!(
                "unsupported HTTP method: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_display() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Head.to_string(), "HEAD");
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert_eq!(Method::Delete.as_str(), "DELETE");
    }

    #[test]
    fn redirect_keeps_method_for_307_and_308() {
        assert_eq!(Method::Post.after_redirect(307), Method::Post);
        assert_eq!(Method::Put.after_redirect(308), Method::Put);
    }

    #[test]
    fn redirect_switches_to_get_for_301_302_303() {
        assert_eq!(Method::Post.after_redirect(301), Method::Get);
        assert_eq!(Method::Put.after_redirect(302), Method::Get);
        assert_eq!(Method::Delete.after_redirect(303), Method::Get);
        assert_eq!(Method::Head.after_redirect(303), Method::Head);
    }

    #[test]
    fn method_http_conversions() {
        assert_eq!(http::Method::from(Method::Options), http::Method::OPTIONS);
        assert_eq!(
            Method::try_from(http::Method::PATCH).expect("PATCH"),
            Method::Patch
        );
        assert!(Method::try_from(http::Method::TRACE).is_err());
    }
}
