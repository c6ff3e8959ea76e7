//! Client configuration types.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ricochet_core::{Decoder, Encoder, HeaderMap, Observer, RetryPolicy, Url};

/// Maximum number of requests in one redirect chain.
pub const MAX_REDIRECTS: usize = 10;

/// Default per-attempt deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// What to do with a 3xx response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectPolicy {
    /// Follow 301, 302, 303, 307 and 308 up to [`MAX_REDIRECTS`] requests.
    #[default]
    Follow,
    /// Stop at the first 3xx and report it as an HTTP status error.
    NoFollow,
}

/// Immutable defaults shared by every call of a client.
///
/// Built by [`crate::ClientBuilder`]; a derived client gets its own deep copy.
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) base_url: Option<Url>,
    pub(crate) headers: HeaderMap,
    pub(crate) encoder: Option<Arc<dyn Encoder>>,
    pub(crate) decoder: Option<Arc<dyn Decoder>>,
    pub(crate) timeout: Duration,
    pub(crate) redirects: RedirectPolicy,
    pub(crate) retry: Option<RetryPolicy>,
    pub(crate) observer: Option<Arc<dyn Observer>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: HeaderMap::new(),
            encoder: None,
            decoder: None,
            timeout: DEFAULT_TIMEOUT,
            redirects: RedirectPolicy::default(),
            retry: None,
            observer: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("headers", &self.headers)
            .field("encoder", &self.encoder.is_some())
            .field("decoder", &self.decoder.is_some())
            .field("timeout", &self.timeout)
            .field("redirects", &self.redirects)
            .field("retry", &self.retry)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl ClientConfig {
    /// Base URL targets are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Default headers sent with every request.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns `true` if request bodies can be encoded.
    #[must_use]
    pub const fn has_encoder(&self) -> bool {
        self.encoder.is_some()
    }

    /// Returns `true` if response bodies are decoded.
    #[must_use]
    pub const fn has_decoder(&self) -> bool {
        self.decoder.is_some()
    }

    /// Per-attempt deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Redirect handling.
    #[must_use]
    pub const fn redirects(&self) -> RedirectPolicy {
        self.redirects
    }

    /// Retry policy, if retries are enabled.
    #[must_use]
    pub const fn retry(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }
}

/// Connection settings of the default hyper transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Connection timeout duration.
    pub connect_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_idle_per_host: usize,
    /// Idle connection timeout.
    pub pool_idle_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            pool_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

impl TransportConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::default()
    }
}

/// Builder for [`TransportConfig`].
#[derive(Debug, Clone, Default)]
pub struct TransportConfigBuilder {
    connect_timeout: Option<Duration>,
    pool_idle_per_host: Option<usize>,
    pool_idle_timeout: Option<Duration>,
}

impl TransportConfigBuilder {
    /// Set the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub const fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.pool_idle_per_host = Some(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub const fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> TransportConfig {
        let defaults = TransportConfig::default();
        TransportConfig {
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            pool_idle_per_host: self
                .pool_idle_per_host
                .unwrap_or(defaults.pool_idle_per_host),
            pool_idle_timeout: self.pool_idle_timeout.unwrap_or(defaults.pool_idle_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_client_config() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert_eq!(config.redirects(), RedirectPolicy::Follow);
        assert!(config.retry().is_none());
        assert!(!config.has_encoder());
        assert!(!config.has_decoder());
    }

    #[test]
    fn default_transport_config() {
        let config = TransportConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.pool_idle_per_host, 32);
    }

    #[test]
    fn transport_builder_overrides() {
        let config = TransportConfig::builder()
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_per_host(16)
            .build();

        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.pool_idle_per_host, 16);
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(90));
    }
}
