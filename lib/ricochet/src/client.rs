//! Client and its builder.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use http::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use tower::Layer;
use tower::util::BoxCloneService;
use tower_service::Service;

use crate::call::Call;
use crate::config::{ClientConfig, RedirectPolicy, TransportConfig};
use crate::transport::{BoxedTransport, HyperTransport, SharedTransport};
use crate::{
    Backoff, Decoder, Encoder, Error, FormEncoder, GzipEncoder, HeaderName, HeaderValue,
    JsonDecoder, JsonEncoder, Method, Observer, Request, Response, Result, RetryPolicy,
    RetryStrategy,
};

const DEFAULT_USER_AGENT: &str = concat!("ricochet/", env!("CARGO_PKG_VERSION"));

type LayerFn = Arc<dyn Fn(BoxedTransport) -> BoxedTransport + Send + Sync>;

/// HTTP client holding immutable defaults and a shared transport.
///
/// Cloning is cheap, and clones share everything. Use [`Client::derive`] to
/// get a client with different defaults over the same transport.
///
/// # Example
///
/// ```ignore
/// use ricochet::Client;
///
/// let client = Client::builder()
///     .base_url("https://api.example.com/v1/")
///     .bearer("my-token")
///     .encode_json()
///     .decode_json()
///     .retry_on_error()
///     .build()?;
///
/// let (_, user): (_, User) = client.get("users/:id").int_param("id", 42).fetch().await?;
/// ```
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    transport: SharedTransport,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client with default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a new client builder.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Start a builder from a copy of this client's configuration.
    ///
    /// The derived client shares the transport (and its connection pool) but
    /// nothing else: options applied to the builder never affect `self`.
    #[must_use]
    pub fn derive(&self) -> ClientBuilder {
        ClientBuilder {
            config: ClientConfig::clone(&self.config),
            transport: Some(self.transport.service()),
            transport_config: TransportConfig::default(),
            layers: Vec::new(),
            error: None,
        }
    }

    /// Get the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start a call with any method.
    pub fn request(&self, method: Method, target: impl Into<String>) -> Call {
        Call::new(self.clone(), method, target.into())
    }

    /// Start a GET call.
    pub fn get(&self, target: impl Into<String>) -> Call {
        self.request(Method::Get, target)
    }

    /// Start a HEAD call.
    pub fn head(&self, target: impl Into<String>) -> Call {
        self.request(Method::Head, target)
    }

    /// Start an OPTIONS call.
    pub fn options(&self, target: impl Into<String>) -> Call {
        self.request(Method::Options, target)
    }

    /// Start a POST call.
    pub fn post(&self, target: impl Into<String>) -> Call {
        self.request(Method::Post, target)
    }

    /// Start a PUT call.
    pub fn put(&self, target: impl Into<String>) -> Call {
        self.request(Method::Put, target)
    }

    /// Start a PATCH call.
    pub fn patch(&self, target: impl Into<String>) -> Call {
        self.request(Method::Patch, target)
    }

    /// Start a DELETE call.
    pub fn delete(&self, target: impl Into<String>) -> Call {
        self.request(Method::Delete, target)
    }

    pub(crate) const fn transport(&self) -> &SharedTransport {
        &self.transport
    }
}

/// Builder for [`Client`].
///
/// Every option is applied in order. The first invalid option is remembered
/// and reported by [`ClientBuilder::build`] as [`Error::Config`]; later
/// options are still applied but cannot hide it.
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<BoxedTransport>,
    transport_config: TransportConfig,
    layers: Vec<LayerFn>,
    error: Option<Error>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        let mut config = ClientConfig::default();
        config
            .headers
            .insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        Self {
            config,
            transport: None,
            transport_config: TransportConfig::default(),
            layers: Vec::new(),
            error: None,
        }
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .field("transport_config", &self.transport_config)
            .field("layers_count", &self.layers.len())
            .field("error", &self.error)
            .finish()
    }
}

impl ClientBuilder {
    fn try_apply(mut self, apply: impl FnOnce(&mut ClientConfig) -> Result<()>) -> Self {
        if let Err(err) = apply(&mut self.config) {
            self.error.get_or_insert(err);
        }
        self
    }

    fn tune_retry(self, tune: impl FnOnce(RetryPolicy) -> Result<RetryPolicy>) -> Self {
        self.try_apply(|config| {
            let policy = config.retry.take().ok_or_else(|| {
                Error::config("retries are not enabled, call retry_on_error() first")
            })?;
            config.retry = Some(tune(policy)?);
            Ok(())
        })
    }

    // ========================================================================
    // URL and Headers
    // ========================================================================

    /// Base URL targets are resolved against.
    ///
    /// Resolution follows RFC 3986: `/items` replaces the whole base path, while
    /// `items` is appended after the last `/` of the base.
    #[must_use]
    pub fn base_url(self, base: &str) -> Self {
        self.try_apply(|config| {
            let url = url::Url::parse(base)
                .map_err(|e| Error::config(format!("invalid base URL {base:?}: {e}")))?;
            config.base_url = Some(url);
            Ok(())
        })
    }

    /// Set a default header, replacing any previous value of the same name.
    #[must_use]
    pub fn header(self, name: &str, value: &str) -> Self {
        self.try_apply(|config| {
            let (name, value) = parse_header(name, value).map_err(Error::config)?;
            config.headers.insert(name, value);
            Ok(())
        })
    }

    /// Send `Authorization: Bearer <token>`.
    #[must_use]
    pub fn bearer(self, token: &str) -> Self {
        self.header(AUTHORIZATION.as_str(), &format!("Bearer {token}"))
    }

    /// Send `Authorization: Basic <base64(username:password)>`.
    #[must_use]
    pub fn basic_auth(self, username: &str, password: &str) -> Self {
        let credentials = format!("{username}:{password}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        self.header(AUTHORIZATION.as_str(), &format!("Basic {encoded}"))
    }

    /// Replace the default `User-Agent`.
    #[must_use]
    pub fn user_agent(self, user_agent: &str) -> Self {
        self.header(USER_AGENT.as_str(), user_agent)
    }

    // ========================================================================
    // Timeouts and Redirects
    // ========================================================================

    /// Deadline of each attempt, redirects included. Defaults to one second.
    #[must_use]
    pub fn request_timeout(self, timeout: Duration) -> Self {
        self.try_apply(|config| {
            if timeout.is_zero() {
                return Err(Error::config("request timeout must be greater than zero"));
            }
            config.timeout = timeout;
            Ok(())
        })
    }

    /// Return 3xx responses as HTTP status errors instead of following them.
    #[must_use]
    pub fn no_follow(mut self) -> Self {
        self.config.redirects = RedirectPolicy::NoFollow;
        self
    }

    /// Follow redirects (the default).
    #[must_use]
    pub fn follow_redirects(mut self) -> Self {
        self.config.redirects = RedirectPolicy::Follow;
        self
    }

    // ========================================================================
    // Codecs
    // ========================================================================

    /// Encode request bodies as JSON.
    #[must_use]
    pub fn encode_json(self) -> Self {
        self.encoder(JsonEncoder)
    }

    /// Encode request bodies as `application/x-www-form-urlencoded`.
    #[must_use]
    pub fn encode_form(self) -> Self {
        self.encoder(FormEncoder)
    }

    /// Encode request bodies with a custom encoder.
    #[must_use]
    pub fn encoder(mut self, encoder: impl Encoder) -> Self {
        self.config.encoder = Some(Arc::new(encoder));
        self
    }

    /// Gzip request bodies of 1 KiB or more. Needs an encoder first.
    #[must_use]
    pub fn gzip_requests(self) -> Self {
        self.try_apply(|config| {
            let inner = config
                .encoder
                .take()
                .ok_or_else(|| Error::config("gzip_requests() needs an encoder configured first"))?;
            config.encoder = Some(Arc::new(GzipEncoder::new(inner)));
            Ok(())
        })
    }

    /// Decode response bodies as JSON and send `Accept: application/json`.
    #[must_use]
    pub fn decode_json(self) -> Self {
        self.decoder(JsonDecoder)
    }

    /// Decode response bodies with a custom decoder.
    #[must_use]
    pub fn decoder(mut self, decoder: impl Decoder) -> Self {
        match decoder.accept() {
            Some(accept) => self.config.headers.insert(ACCEPT, accept),
            None => self.config.headers.remove(ACCEPT),
        };
        self.config.decoder = Some(Arc::new(decoder));
        self
    }

    /// Stop decoding responses: the caller owns every response body.
    #[must_use]
    pub fn dont_decode(mut self) -> Self {
        self.config.decoder = None;
        self.config.headers.remove(ACCEPT);
        self
    }

    // ========================================================================
    // Observability
    // ========================================================================

    /// Call `observer` for every physical request.
    #[must_use]
    pub fn observe(mut self, observer: impl Observer) -> Self {
        self.config.observer = Some(Arc::new(observer));
        self
    }

    // ========================================================================
    // Retries
    // ========================================================================

    /// Retry transport failures and 5xx responses.
    ///
    /// Defaults: 3 attempts, 30 s budget, exponential backoff from 50 ms to
    /// 5 s with factor 2 and 10% jitter. Must come before any other retry
    /// option.
    #[must_use]
    pub fn retry_on_error(mut self) -> Self {
        self.config.retry.get_or_insert_with(RetryPolicy::default);
        self
    }

    /// Total attempts, first one included.
    #[must_use]
    pub fn retry_max_attempts(self, max_attempts: u32) -> Self {
        self.tune_retry(|policy| policy.with_max_attempts(max_attempts))
    }

    /// No new attempt starts once it would end past this budget.
    #[must_use]
    pub fn retry_max_duration(self, max_duration: Duration) -> Self {
        self.tune_retry(|policy| Ok(policy.with_max_duration(max_duration)))
    }

    /// Exponential backoff: `min(initial * multiplier^(n-1), max) ± jitter`.
    #[must_use]
    pub fn retry_backoff(
        self,
        initial: Duration,
        max: Duration,
        multiplier: f64,
        jitter: f64,
    ) -> Self {
        self.tune_retry(|policy| {
            let backoff = Backoff::exponential(initial, max, multiplier, jitter)?;
            Ok(policy.with_backoff(backoff))
        })
    }

    /// Wait the same delay before every retry.
    #[must_use]
    pub fn retry_delay(self, delay: Duration) -> Self {
        self.tune_retry(|policy| Ok(policy.with_backoff(Backoff::Fixed(delay))))
    }

    /// Divide every retry delay by `factor`, for tests.
    #[must_use]
    pub fn retry_speedup_factor(self, factor: u32) -> Self {
        self.tune_retry(|policy| policy.with_speedup(factor))
    }

    /// Decide retries with a custom strategy, created fresh for every call.
    ///
    /// The strategy replaces classification and delays; attempts, the time
    /// budget and cancellation still apply.
    #[must_use]
    pub fn retry_strategy<F, S>(self, factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: RetryStrategy + 'static,
    {
        self.tune_retry(|policy| {
            Ok(policy.with_strategy(Arc::new(move || -> Box<dyn RetryStrategy> {
                Box::new(factory())
            })))
        })
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Connection settings of the default hyper transport.
    ///
    /// On a derived builder this stops sharing the parent's transport.
    #[must_use]
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = config;
        self.transport = None;
        self
    }

    /// Replace the transport with any tower service.
    ///
    /// The service sees one physical request at a time and must not follow
    /// redirects itself.
    #[must_use]
    pub fn transport<S>(mut self, service: S) -> Self
    where
        S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        S::Future: Send + 'static,
    {
        self.transport = Some(BoxCloneService::new(service));
        self
    }

    /// Add a Tower layer around the transport.
    ///
    /// Layers are applied in order: the last one added sees requests first.
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxedTransport> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.layers
            .push(Arc::new(move |service: BoxedTransport| -> BoxedTransport {
                BoxCloneService::new(layer.layer(service))
            }));
        self
    }

    // ========================================================================
    // Build
    // ========================================================================

    /// Build the client, or report the first configuration error.
    pub fn build(self) -> Result<Client> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut service = self
            .transport
            .unwrap_or_else(|| HyperTransport::boxed(&self.transport_config));
        for layer_fn in self.layers {
            service = layer_fn(service);
        }

        Ok(Client {
            config: Arc::new(self.config),
            transport: SharedTransport::new(service),
        })
    }
}

fn parse_header(name: &str, value: &str) -> std::result::Result<(HeaderName, HeaderValue), String> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| format!("invalid header name {name:?}: {e}"))?;
    let header_value =
        HeaderValue::from_str(value).map_err(|e| format!("invalid value for header {name}: {e}"))?;
    Ok((header_name, header_value))
}

pub(crate) fn parse_call_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    parse_header(name, value).map_err(Error::invalid_request)
}
